//! Public types for the photocat API: catalog records, options, change events.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::utils::config::{CatalogDefaults, PackagePaths};

/// One cataloged directory. Identity is `id`; `path` is the lookup key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub id: Uuid,
    pub path: PathBuf,
}

impl Folder {
    pub fn new(path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
        }
    }
}

/// Width × height in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Orientation applied to the thumbnail, from EXIF.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ImageRotation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl ImageRotation {
    pub fn degrees(self) -> u32 {
        match self {
            ImageRotation::Rotate0 => 0,
            ImageRotation::Rotate90 => 90,
            ImageRotation::Rotate180 => 180,
            ImageRotation::Rotate270 => 270,
        }
    }

    /// Inverse of [`Self::degrees`]; anything unknown maps to no rotation.
    pub fn from_degrees(degrees: u32) -> Self {
        match degrees {
            90 => ImageRotation::Rotate90,
            180 => ImageRotation::Rotate180,
            270 => ImageRotation::Rotate270,
            _ => ImageRotation::Rotate0,
        }
    }

    /// Map an EXIF orientation tag (1..=8) to a rotation. Mirrored orientations are not rotated.
    pub fn from_exif_orientation(orientation: u32) -> Self {
        match orientation {
            3 => ImageRotation::Rotate180,
            6 => ImageRotation::Rotate90,
            8 => ImageRotation::Rotate270,
            _ => ImageRotation::Rotate0,
        }
    }
}

/// Diagnostic flag with an optional explanation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Flag {
    pub is_true: bool,
    pub message: Option<String>,
}

impl Flag {
    pub fn set(message: impl Into<String>) -> Self {
        Self {
            is_true: true,
            message: Some(message.into()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AssetMetadata {
    pub corrupted: Flag,
    pub rotated: Flag,
}

/// One cataloged file. `(folder_id, file_name)` is unique across the catalog.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Asset {
    pub folder_id: Uuid,
    pub file_name: String,
    pub pixel_size: PixelSize,
    pub thumbnail_size: PixelSize,
    /// File size in bytes.
    pub size: u64,
    /// Filesystem creation time in nanoseconds since epoch (0 when the platform has none).
    pub created_ns: i64,
    /// Filesystem modification time in nanoseconds since epoch. Drives update detection.
    pub modified_ns: i64,
    pub thumbnail_created_at: DateTime<Utc>,
    pub image_rotation: ImageRotation,
    pub hash: String,
    pub metadata: AssetMetadata,
    /// Decoded thumbnail bytes, only present when a reader materializes them. Never persisted.
    #[serde(skip)]
    pub image_data: Option<Vec<u8>>,
}

/// Image or video, decided by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AssetKind {
    Image,
    Video,
}

/// An eligible file as seen on disk during a folder inspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskFile {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: AssetKind,
    pub size: u64,
    pub created_ns: i64,
    pub modified_ns: i64,
}

/// Content fingerprint algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum HashMode {
    /// blake3 over the raw file bytes.
    #[default]
    Blake3,
    /// 64-bit difference hash over the decoded image.
    DHash,
    /// 64-bit DCT perceptual hash over the decoded image.
    PHash,
}

impl FromStr for HashMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashMode::Blake3),
            "dhash" => Ok(HashMode::DHash),
            "phash" => Ok(HashMode::PHash),
            other => anyhow::bail!("unknown hash mode: {other} (expected blake3, dhash, phash)"),
        }
    }
}

/// Outcome of the backup step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BackupStatus {
    Creating,
    Updating,
    NoChanges,
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackupStatus::Creating => "creating backup",
            BackupStatus::Updating => "updating backup",
            BackupStatus::NoChanges => "no backup changes",
        };
        f.write_str(s)
    }
}

fn serialize_error<S: Serializer>(error: &Arc<anyhow::Error>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{error:#}"))
}

/// One step of a sync run, in emission order.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event")]
pub enum CatalogChangeEvent {
    InspectingFolder {
        folder: PathBuf,
        known_folders: Vec<Folder>,
    },
    FolderAdded {
        folder: Folder,
        known_folders: Vec<Folder>,
    },
    FolderDeleted {
        folder: Folder,
        remaining_folders: Vec<Folder>,
    },
    AssetAdded {
        folder: Folder,
        asset: Asset,
        assets_in_folder: Vec<Asset>,
    },
    AssetUpdated {
        folder: Folder,
        asset: Asset,
        assets_in_folder: Vec<Asset>,
    },
    AssetDeleted {
        folder: Folder,
        asset: Asset,
        assets_in_folder: Vec<Asset>,
        was_corrupted: bool,
    },
    AssetRejected {
        path: PathBuf,
        reason: String,
    },
    FolderInspected {
        folder: PathBuf,
    },
    BackupStatus {
        status: BackupStatus,
    },
    Error {
        #[serde(serialize_with = "serialize_error")]
        error: Arc<anyhow::Error>,
    },
    End,
}

impl CatalogChangeEvent {
    /// Variant name; the `event` key of the JSON form.
    pub fn reason(&self) -> &'static str {
        match self {
            CatalogChangeEvent::InspectingFolder { .. } => "InspectingFolder",
            CatalogChangeEvent::FolderAdded { .. } => "FolderAdded",
            CatalogChangeEvent::FolderDeleted { .. } => "FolderDeleted",
            CatalogChangeEvent::AssetAdded { .. } => "AssetAdded",
            CatalogChangeEvent::AssetUpdated { .. } => "AssetUpdated",
            CatalogChangeEvent::AssetDeleted { .. } => "AssetDeleted",
            CatalogChangeEvent::AssetRejected { .. } => "AssetRejected",
            CatalogChangeEvent::FolderInspected { .. } => "FolderInspected",
            CatalogChangeEvent::BackupStatus { .. } => "BackupStatus",
            CatalogChangeEvent::Error { .. } => "Error",
            CatalogChangeEvent::End => "End",
        }
    }

    /// True for the asset-level operations that count against the batch limit.
    pub fn is_asset_change(&self) -> bool {
        matches!(
            self,
            CatalogChangeEvent::AssetAdded { .. }
                | CatalogChangeEvent::AssetUpdated { .. }
                | CatalogChangeEvent::AssetDeleted { .. }
        )
    }
}

/// Counts and flags describing how a run ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub folders_added: usize,
    pub folders_deleted: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub rejected: usize,
    pub cancelled: bool,
    pub batch_limited: bool,
    pub errored: bool,
    pub backup: Option<BackupStatus>,
}

impl SyncSummary {
    /// Number of asset-level operations processed (the batch counter).
    pub fn operations(&self) -> usize {
        self.added + self.updated + self.deleted + self.rejected
    }
}

/// Pre-resolved settings for a sync run.
#[derive(Clone, Debug)]
pub struct CatalogOpts {
    /// Directory tree to catalog.
    pub root: PathBuf,
    /// Data store root; `tables/` and `blobs/` live under it.
    pub store_dir: PathBuf,
    /// Where dated `YYYYMMDD.zip` archives go.
    pub backups_dir: PathBuf,
    /// Output folder for extracted video first frames. Cataloged like any other folder.
    pub first_frame_dir: PathBuf,
    /// Max Add/Update/Delete operations per run. 0 inspects folders without changing assets.
    pub batch_size: usize,
    pub thumbnail_max_width: u32,
    pub thumbnail_max_height: u32,
    pub hash_mode: HashMode,
    pub analyse_videos: bool,
    /// Lowercase extensions without the dot.
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    /// Modification-time tolerance in nanoseconds. 0 compares exactly.
    pub mtime_window_ns: i64,
    pub verbose: bool,
}

impl CatalogOpts {
    /// Defaults for `root`: store, backups, and first frames all live in dot-dirs under it.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let paths = PackagePaths::get();
        Self {
            store_dir: root.join(paths.store_dir_name()),
            backups_dir: root.join(paths.backups_dir_name()),
            first_frame_dir: root.join(paths.first_frame_dir_name()),
            root,
            batch_size: CatalogDefaults::BATCH_SIZE,
            thumbnail_max_width: CatalogDefaults::THUMBNAIL_MAX_WIDTH,
            thumbnail_max_height: CatalogDefaults::THUMBNAIL_MAX_HEIGHT,
            hash_mode: HashMode::default(),
            analyse_videos: false,
            image_extensions: CatalogDefaults::image_extensions(),
            video_extensions: CatalogDefaults::video_extensions(),
            mtime_window_ns: 0,
            verbose: false,
        }
    }
}
