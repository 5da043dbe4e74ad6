//! Path, timestamp, and eligibility utilities

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{AssetKind, CatalogOpts, DiskFile};

/// Check if a file should be excluded based on OS-specific hidden files
pub fn is_os_hidden_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        match name {
            // macOS
            ".DS_Store" | ".AppleDouble" | ".LSOverride" => true,
            // Windows
            "Thumbs.db" | "ehthumbs.db" | "Desktop.ini" | "$RECYCLE.BIN" => true,
            // Linux
            ".directory" => true,
            _ => {
                // macOS resource fork files start with ._
                name.starts_with("._") || name.starts_with(".Trash-")
            }
        }
    } else {
        false
    }
}

/// Lowercased extension of `path` without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Image or video when `path` has a configured extension. Videos only count when analysis is on.
pub fn eligible_kind(path: &Path, opts: &CatalogOpts) -> Option<AssetKind> {
    if is_os_hidden_file(path) {
        return None;
    }
    let ext = extension_of(path)?;
    if opts.image_extensions.iter().any(|e| *e == ext) {
        Some(AssetKind::Image)
    } else if opts.analyse_videos && opts.video_extensions.iter().any(|e| *e == ext) {
        Some(AssetKind::Video)
    } else {
        None
    }
}

/// Nanoseconds since epoch; times before the epoch (or unavailable) become 0.
pub fn system_time_to_ns(t: std::io::Result<SystemTime>) -> i64 {
    t.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

pub fn ns_to_system_time(ns: i64) -> SystemTime {
    UNIX_EPOCH + std::time::Duration::from_nanos(ns.max(0) as u64)
}

/// Build a [`DiskFile`] from a path and its metadata.
pub fn disk_file(path: PathBuf, meta: &Metadata, kind: AssetKind) -> DiskFile {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    DiskFile {
        file_name,
        kind,
        size: meta.len(),
        created_ns: system_time_to_ns(meta.created()),
        modified_ns: system_time_to_ns(meta.modified()),
        path,
    }
}

/// Tolerance window in seconds as nanoseconds. Saturates instead of overflowing.
pub fn window_secs_to_ns(secs: u64) -> i64 {
    i64::try_from(secs)
        .unwrap_or(i64::MAX)
        .saturating_mul(1_000_000_000)
}

/// Check if mtime has changed beyond tolerance window
pub fn mtime_changed(new_mtime: i64, old_mtime: i64, tolerance_ns: i64) -> bool {
    let mtime_diff = (new_mtime - old_mtime).abs();
    mtime_diff > tolerance_ns
}

/// True when `path` is one of `excluded` or lives under one of them.
pub fn is_under_any(path: &Path, excluded: &[PathBuf]) -> bool {
    excluded.iter().any(|e| path.starts_with(e))
}

/// Convert a path to the string stored in the tables (forward slashes).
pub fn path_to_db_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Absolute, canonical form of `path` without requiring it to exist: the deepest existing
/// ancestor is canonicalized and the missing tail is appended.
pub fn absolutize(path: &Path) -> PathBuf {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut existing = abs.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return tail.iter().rev().fold(canonical, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return abs,
        }
    }
}
