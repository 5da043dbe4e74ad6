//! Asset creation: turn one file on disk into a catalog record, or a rejection.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, warn};
use std::path::PathBuf;
use uuid::Uuid;

use crate::engine::hashing::{content_hash, digest_hex, hash_bytes, hash_file};
use crate::engine::thumbnail::{ThumbnailOutcome, generate_thumbnail};
use crate::engine::video::{FrameExtractor, first_frame_path, stamp_modified};
use crate::{Asset, AssetKind, AssetMetadata, CatalogOpts, DiskFile, Flag, HashMode};

/// A new record plus its encoded thumbnail. `asset.folder_id` is unset (nil); the caller files it.
#[derive(Clone, Debug)]
pub struct CreatedAsset {
    pub asset: Asset,
    pub thumbnail: Vec<u8>,
    /// Set for video proxies: the asset belongs in the first-frame folder.
    pub first_frame: Option<PathBuf>,
}

pub enum CreationOutcome {
    Created(CreatedAsset),
    /// The file could not be decoded. Nothing is cataloged.
    Rejected { path: PathBuf, reason: String },
    /// Videos while video analysis is off.
    Ignored,
}

/// Hash + thumbnail (+ first frame for videos). Never touches the data store.
pub struct AssetCreator<'a> {
    opts: &'a CatalogOpts,
    extractor: &'a dyn FrameExtractor,
}

impl<'a> AssetCreator<'a> {
    pub fn new(opts: &'a CatalogOpts, extractor: &'a dyn FrameExtractor) -> Self {
        Self { opts, extractor }
    }

    pub fn create(&self, file: &DiskFile) -> Result<CreationOutcome> {
        match file.kind {
            AssetKind::Image => self.create_image(file),
            AssetKind::Video if !self.opts.analyse_videos => {
                debug!("ignoring video {} (analysis off)", file.path.display());
                Ok(CreationOutcome::Ignored)
            }
            AssetKind::Video => self.create_video_proxy(file),
        }
    }

    fn create_image(&self, file: &DiskFile) -> Result<CreationOutcome> {
        let bytes =
            std::fs::read(&file.path).with_context(|| format!("read {}", file.path.display()))?;
        // Byte hash before decoding; perceptual modes wait for the decoded image.
        let hash = (self.opts.hash_mode == HashMode::Blake3).then(|| hash_bytes(&bytes));
        self.assemble(file, file.file_name.clone(), &bytes, hash, None)
    }

    fn create_video_proxy(&self, file: &DiskFile) -> Result<CreationOutcome> {
        // Identity comes from the video itself.
        let digest = hash_file(&file.path, file.size)
            .with_context(|| format!("hash {}", file.path.display()))?;
        let frame_path = first_frame_path(&self.opts.first_frame_dir, &file.file_name);
        std::fs::create_dir_all(&self.opts.first_frame_dir).with_context(|| {
            format!(
                "create first-frame folder {}",
                self.opts.first_frame_dir.display()
            )
        })?;
        if let Err(e) = self.extractor.extract_first_frame(&file.path, &frame_path) {
            warn!("first frame extraction failed: {e:#}");
            return Ok(CreationOutcome::Rejected {
                path: file.path.clone(),
                reason: format!("The video is corrupted: {e:#}"),
            });
        }
        stamp_modified(&frame_path, file.modified_ns)?;
        let frame_bytes = std::fs::read(&frame_path)
            .with_context(|| format!("read first frame {}", frame_path.display()))?;
        let frame_name = frame_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.assemble(
            file,
            frame_name,
            &frame_bytes,
            Some(digest_hex(digest)),
            Some(frame_path),
        )
    }

    /// Decode the image payload and build the record. `hash` is precomputed for byte-based
    /// modes; perceptual modes hash the decoded payload.
    fn assemble(
        &self,
        file: &DiskFile,
        file_name: String,
        payload: &[u8],
        hash: Option<String>,
        first_frame: Option<PathBuf>,
    ) -> Result<CreationOutcome> {
        let outcome = generate_thumbnail(
            payload,
            self.opts.thumbnail_max_width,
            self.opts.thumbnail_max_height,
        )?;
        let thumb = match outcome {
            ThumbnailOutcome::Ready(thumb) => thumb,
            ThumbnailOutcome::Corrupted(reason) => {
                warn!("{}: {}", file.path.display(), reason);
                return Ok(CreationOutcome::Rejected {
                    path: file.path.clone(),
                    reason,
                });
            }
        };
        let hash =
            hash.unwrap_or_else(|| content_hash(self.opts.hash_mode, payload, &thumb.image));

        let rotated = match thumb.orientation {
            Some(tag) => Flag::set(format!("The image has been rotated (EXIF orientation {tag})")),
            None => Flag::default(),
        };
        let asset = Asset {
            folder_id: Uuid::nil(),
            file_name,
            pixel_size: thumb.source_size,
            thumbnail_size: thumb.size,
            size: file.size,
            created_ns: file.created_ns,
            modified_ns: file.modified_ns,
            thumbnail_created_at: Utc::now(),
            image_rotation: thumb.rotation,
            hash,
            metadata: AssetMetadata {
                corrupted: Flag::default(),
                rotated,
            },
            image_data: None,
        };
        Ok(CreationOutcome::Created(CreatedAsset {
            asset,
            thumbnail: thumb.bytes,
            first_frame,
        }))
    }
}
