//! Decode, orient, and shrink images into JPEG thumbnails.

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;

use crate::utils::config::CatalogDefaults;
use crate::{ImageRotation, PixelSize};

/// An encoded thumbnail plus what was learned while producing it.
#[derive(Clone, Debug)]
pub struct Thumbnail {
    /// Decoded source, unrotated. Perceptual hashes are computed from it.
    pub image: DynamicImage,
    pub bytes: Vec<u8>,
    pub size: PixelSize,
    /// Intrinsic size of the decoded source, before rotation.
    pub source_size: PixelSize,
    pub rotation: ImageRotation,
    /// EXIF orientation tag when it asked for a rotation.
    pub orientation: Option<u32>,
}

/// Decoding either succeeds or marks the payload as corrupted. Never an error.
pub enum ThumbnailOutcome {
    Ready(Thumbnail),
    Corrupted(String),
}

/// Decode `bytes` into an image. The message of a failure is kept for the catalog's diagnostics.
fn decode_image(bytes: &[u8]) -> std::result::Result<DynamicImage, String> {
    let image = image::load_from_memory(bytes).map_err(|e| format!("The image is corrupted: {e}"))?;
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err("The image is corrupted: zero-sized image".to_string());
    }
    Ok(image)
}

/// EXIF orientation tag (1..=8) from the container, if the format carries one.
pub fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    match field.value.get_uint(0) {
        Some(v @ 1..=8) => Some(v),
        _ => None,
    }
}

fn rotate(image: &DynamicImage, rotation: ImageRotation) -> DynamicImage {
    match rotation {
        ImageRotation::Rotate0 => image.clone(),
        ImageRotation::Rotate90 => image.rotate90(),
        ImageRotation::Rotate180 => image.rotate180(),
        ImageRotation::Rotate270 => image.rotate270(),
    }
}

/// Build the thumbnail of an already decoded image. `bytes` are only consulted for EXIF.
fn make_thumbnail(
    image: DynamicImage,
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
) -> Result<Thumbnail> {
    let (w, h) = image.dimensions();
    let orientation = read_orientation(bytes);
    let rotation = orientation
        .map(ImageRotation::from_exif_orientation)
        .unwrap_or_default();

    let oriented = rotate(&image, rotation);
    // Aspect-preserving bound; never upscale small images.
    let (ow, oh) = oriented.dimensions();
    let max_w = max_width.max(1);
    let max_h = max_height.max(1);
    let small = if ow <= max_w && oh <= max_h {
        oriented
    } else {
        oriented.thumbnail(max_w, max_h)
    };

    let rgb = DynamicImage::ImageRgb8(small.to_rgb8());
    let mut bytes_out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
        &mut bytes_out,
        CatalogDefaults::THUMBNAIL_JPEG_QUALITY,
    );
    rgb.write_with_encoder(encoder)
        .context("encode thumbnail as JPEG")?;

    Ok(Thumbnail {
        image,
        bytes: bytes_out,
        size: PixelSize::new(rgb.width(), rgb.height()),
        source_size: PixelSize::new(w, h),
        rotation,
        orientation: orientation.filter(|_| rotation != ImageRotation::Rotate0),
    })
}

/// Decode + thumbnail in one step. An undecodable payload is `Corrupted`, not an error.
pub fn generate_thumbnail(bytes: &[u8], max_width: u32, max_height: u32) -> Result<ThumbnailOutcome> {
    match decode_image(bytes) {
        Ok(image) => Ok(ThumbnailOutcome::Ready(make_thumbnail(
            image, bytes, max_width, max_height,
        )?)),
        Err(msg) => Ok(ThumbnailOutcome::Corrupted(msg)),
    }
}
