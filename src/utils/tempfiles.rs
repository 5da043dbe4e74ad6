use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// Sibling work path for `target`: `<name>.tmp` in the same directory, so the final rename
/// stays on one filesystem.
pub fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_else(|| PackagePaths::get().pkg_name());
    target
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}.tmp"))
}

/// Remove a stale work file or directory left by an interrupted run.
pub fn remove_stale(temp_path: &Path) -> Result<()> {
    let res = if temp_path.is_dir() {
        fs::remove_dir_all(temp_path)
    } else if temp_path.exists() {
        fs::remove_file(temp_path)
    } else {
        return Ok(());
    };
    res.with_context(|| format!("remove stale temp {}", temp_path.display()))
}

/// Move a finished temp file over `target`.
pub fn commit_temp_file(temp_path: &Path, target: &Path) -> Result<()> {
    fs::rename(temp_path, target).with_context(|| {
        format!(
            "rename {} -> {}",
            temp_path.display(),
            target.display()
        )
    })
}

/// Move a finished temp directory over `target`, removing the old directory first.
pub fn commit_temp_dir(temp_path: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        fs::remove_dir_all(target)
            .with_context(|| format!("remove old {}", target.display()))?;
    }
    commit_temp_file(temp_path, target)
}
