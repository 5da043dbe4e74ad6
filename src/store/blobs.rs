//! Thumbnail blobs: one directory per folder id, one `<file-name>.bin` per asset.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::utils::config::StoreLayout;
use crate::utils::tempfiles::{commit_temp_dir, remove_stale, temp_path_for};

pub fn folder_blob_dir(blobs_dir: &Path, folder_id: Uuid) -> PathBuf {
    blobs_dir.join(folder_id.to_string())
}

fn blob_file_name(file_name: &str) -> String {
    format!("{file_name}.{}", StoreLayout::BLOB_EXTENSION)
}

/// Read every thumbnail of one folder. A missing directory is an empty folder.
pub fn read_folder_blobs(blobs_dir: &Path, folder_id: Uuid) -> Result<HashMap<String, Vec<u8>>> {
    let dir = folder_blob_dir(blobs_dir, folder_id);
    let mut out = HashMap::new();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e).with_context(|| format!("read blob dir {}", dir.display())),
    };
    let suffix = format!(".{}", StoreLayout::BLOB_EXTENSION);
    for entry in entries {
        let entry = entry.with_context(|| format!("read blob dir {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(file_name) = name.strip_suffix(&suffix) else {
            continue;
        };
        let bytes = fs::read(entry.path())
            .with_context(|| format!("read blob {}", entry.path().display()))?;
        out.insert(file_name.to_string(), bytes);
    }
    Ok(out)
}

/// Replace a folder's blob directory with `thumbnails`. Written to a sibling temp directory
/// first, then swapped in.
pub fn write_folder_blobs(
    blobs_dir: &Path,
    folder_id: Uuid,
    thumbnails: &HashMap<String, Vec<u8>>,
) -> Result<()> {
    let dir = folder_blob_dir(blobs_dir, folder_id);
    if thumbnails.is_empty() {
        return remove_folder_blobs(blobs_dir, folder_id);
    }
    let temp = temp_path_for(&dir);
    remove_stale(&temp)?;
    fs::create_dir_all(&temp).with_context(|| format!("create {}", temp.display()))?;
    for (file_name, bytes) in thumbnails {
        let path = temp.join(blob_file_name(file_name));
        fs::write(&path, bytes).with_context(|| format!("write blob {}", path.display()))?;
    }
    commit_temp_dir(&temp, &dir)
}

pub fn remove_folder_blobs(blobs_dir: &Path, folder_id: Uuid) -> Result<()> {
    let dir = folder_blob_dir(blobs_dir, folder_id);
    match fs::remove_dir_all(&dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove blob dir {}", dir.display())),
    }
}
