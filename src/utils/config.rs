//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    store_dir_name: String,
    backups_dir_name: String,
    first_frame_dir_name: String,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                store_dir_name: format!(".{pkg}"),
                backups_dir_name: format!(".{pkg}_backups"),
                first_frame_dir_name: format!(".{pkg}_frames"),
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    pub fn store_dir_name(&self) -> &str {
        &self.store_dir_name
    }

    pub fn backups_dir_name(&self) -> &str {
        &self.backups_dir_name
    }

    pub fn first_frame_dir_name(&self) -> &str {
        &self.first_frame_dir_name
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- Data store layout ----

/// Directory and file names inside the data store root.
pub struct StoreLayout;

impl StoreLayout {
    pub const TABLES_DIR: &'static str = "tables";
    pub const BLOBS_DIR: &'static str = "blobs";
    pub const CATALOG_DB: &'static str = "catalog.db";
    /// Suffix of one thumbnail blob file.
    pub const BLOB_EXTENSION: &'static str = "bin";
    /// chrono format of a backup archive stem.
    pub const BACKUP_DATE_FORMAT: &'static str = "%Y%m%d";
    pub const BACKUP_EXTENSION: &'static str = "zip";
}

// ---- Catalog defaults ----

/// Defaults for [`CatalogOpts`](crate::CatalogOpts) when neither file nor CLI sets a value.
pub struct CatalogDefaults;

impl CatalogDefaults {
    pub const BATCH_SIZE: usize = 10_000;
    pub const THUMBNAIL_MAX_WIDTH: u32 = 200;
    pub const THUMBNAIL_MAX_HEIGHT: u32 = 150;
    /// JPEG quality of encoded thumbnails.
    pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;
    /// Extension of extracted first-frame images.
    pub const FIRST_FRAME_EXTENSION: &'static str = "jpg";

    const IMAGE_EXTENSIONS: &'static [&'static str] = &[
        "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "jfif",
    ];
    const VIDEO_EXTENSIONS: &'static [&'static str] = &[
        "mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v", "3gp", "mpg", "mpeg",
    ];

    pub fn image_extensions() -> Vec<String> {
        Self::IMAGE_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    pub fn video_extensions() -> Vec<String> {
        Self::VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }
}

// ---- Hashing ----

/// Hashing I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
    /// Side of the grayscale grid the DCT hash is computed over.
    pub const PHASH_SIZE: u32 = 32;
    /// Side of the low-frequency block kept from the DCT.
    pub const PHASH_LOW_BAND: usize = 8;
}
