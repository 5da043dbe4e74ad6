//! Content hashing: blake3 over bytes, plus perceptual hashes over decoded images.

use anyhow::Result;
use blake3::Hasher;
use image::DynamicImage;
use image::imageops::FilterType;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::HashMode;
use crate::utils::config::HashingConsts;

/// Hash a file with blake3. Uses memory-mapped I/O for files above threshold, chunked reading otherwise.
pub fn hash_file(path: &Path, size: u64) -> Result<[u8; 32]> {
    let file = File::open(path)?;
    let mut hasher = Hasher::new();

    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        // Memory-mapped I/O for large files (Blake3 already uses SIMD internally)
        let mmap = unsafe { Mmap::map(&file)? };
        hasher.update(&mmap);
    } else {
        use std::io::Read;
        let mut reader =
            std::io::BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
        let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }

    Ok(*hasher.finalize().as_bytes())
}

/// Lowercase hex of a 32-byte digest.
pub fn digest_hex(digest: [u8; 32]) -> String {
    blake3::Hash::from(digest).to_hex().to_string()
}

/// blake3 of in-memory bytes, as hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Fingerprint for `mode`. Perceptual modes need the decoded image; blake3 only the bytes.
pub fn content_hash(mode: HashMode, bytes: &[u8], image: &DynamicImage) -> String {
    match mode {
        HashMode::Blake3 => hash_bytes(bytes),
        HashMode::DHash => format!("{:016x}", dhash(image)),
        HashMode::PHash => format!("{:016x}", phash(image)),
    }
}

/// Difference hash: 9×8 grayscale, one bit per horizontal neighbour comparison.
pub fn dhash(image: &DynamicImage) -> u64 {
    let small = image.resize_exact(9, 8, FilterType::Triangle).to_luma8();
    let mut bits = 0u64;
    for y in 0..8 {
        for x in 0..8 {
            bits <<= 1;
            if small.get_pixel(x, y)[0] < small.get_pixel(x + 1, y)[0] {
                bits |= 1;
            }
        }
    }
    bits
}

/// 1-D DCT-II of `input` (unnormalized; only relative magnitudes matter here).
fn dct_1d(input: &[f64], output: &mut [f64]) {
    let n = input.len();
    for (k, out) in output.iter_mut().enumerate() {
        *out = input
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v * (std::f64::consts::PI / n as f64 * (i as f64 + 0.5) * k as f64).cos()
            })
            .sum();
    }
}

/// DCT perceptual hash: 32×32 grayscale, separable DCT, 8×8 low band against its mean (DC excluded).
pub fn phash(image: &DynamicImage) -> u64 {
    let n = HashingConsts::PHASH_SIZE as usize;
    let band = HashingConsts::PHASH_LOW_BAND;
    let small = image
        .resize_exact(
            HashingConsts::PHASH_SIZE,
            HashingConsts::PHASH_SIZE,
            FilterType::Triangle,
        )
        .to_luma8();
    let pixels: Vec<f64> = small.pixels().map(|p| p[0] as f64).collect();

    // Rows, then columns.
    let mut rows = vec![0.0; n * n];
    for r in 0..n {
        dct_1d(&pixels[r * n..(r + 1) * n], &mut rows[r * n..(r + 1) * n]);
    }
    let mut coeffs = vec![0.0; n * n];
    let mut column = vec![0.0; n];
    let mut column_out = vec![0.0; n];
    for c in 0..n {
        for r in 0..n {
            column[r] = rows[r * n + c];
        }
        dct_1d(&column, &mut column_out);
        for r in 0..n {
            coeffs[r * n + c] = column_out[r];
        }
    }

    let low: Vec<f64> = (0..band)
        .flat_map(|r| (0..band).map(move |c| (r, c)))
        .map(|(r, c)| coeffs[r * n + c])
        .collect();
    let mean = low[1..].iter().sum::<f64>() / (low.len() - 1) as f64;
    low.iter()
        .fold(0u64, |bits, v| (bits << 1) | u64::from(*v > mean))
}

/// Number of differing bits between two perceptual hashes.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
