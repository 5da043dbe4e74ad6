//! Dated zip archives of the data store.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::BackupStatus;
use crate::utils::config::StoreLayout;
use crate::utils::tempfiles::{commit_temp_file, remove_stale, temp_path_for};

/// At most one archive per calendar day: `<backups_dir>/YYYYMMDD.zip`.
pub struct BackupManager {
    backups_dir: PathBuf,
    store_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backups_dir: impl Into<PathBuf>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            store_dir: store_dir.into(),
        }
    }

    pub fn backup_path_for(&self, date: NaiveDate) -> PathBuf {
        self.backups_dir.join(format!(
            "{}.{}",
            date.format(StoreLayout::BACKUP_DATE_FORMAT),
            StoreLayout::BACKUP_EXTENSION
        ))
    }

    pub fn backup_exists(&self, date: NaiveDate) -> bool {
        self.backup_path_for(date).is_file()
    }

    /// Create today's archive if missing, rewrite it if the catalog changed, otherwise leave it.
    pub fn run(&self, date: NaiveDate, catalog_changed: bool) -> Result<BackupStatus> {
        let target = self.backup_path_for(date);
        let status = if !target.is_file() {
            BackupStatus::Creating
        } else if catalog_changed {
            BackupStatus::Updating
        } else {
            debug!("backup {} is current", target.display());
            return Ok(BackupStatus::NoChanges);
        };

        std::fs::create_dir_all(&self.backups_dir)
            .with_context(|| format!("create backups dir {}", self.backups_dir.display()))?;
        let entries = self.write_archive(&target)?;
        info!("{status}: {} ({entries} entries)", target.display());
        Ok(status)
    }

    /// Zip the `tables/` and `blobs/` trees into `target` via a temp file.
    fn write_archive(&self, target: &Path) -> Result<usize> {
        let temp = temp_path_for(target);
        remove_stale(&temp)?;
        let file = File::create(&temp).with_context(|| format!("create {}", temp.display()))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut entries = 0_usize;
        for sub in [StoreLayout::TABLES_DIR, StoreLayout::BLOBS_DIR] {
            let base = self.store_dir.join(sub);
            if !base.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&base).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walk {}", base.display()))?;
                let rel = entry
                    .path()
                    .strip_prefix(&self.store_dir)
                    .with_context(|| format!("relativize {}", entry.path().display()))?;
                let name = rel.to_string_lossy().replace('\\', "/");
                if entry.file_type().is_dir() {
                    zip.add_directory(format!("{name}/"), options)
                        .with_context(|| format!("add {name}/ to archive"))?;
                } else if entry.file_type().is_file() {
                    let bytes = std::fs::read(entry.path())
                        .with_context(|| format!("read {}", entry.path().display()))?;
                    zip.start_file(name.as_str(), options)
                        .with_context(|| format!("add {name} to archive"))?;
                    zip.write_all(&bytes)
                        .with_context(|| format!("write {name} to archive"))?;
                    entries += 1;
                }
            }
        }
        let mut writer = zip.finish().context("finish archive")?;
        writer.flush().context("flush archive")?;
        drop(writer);
        commit_temp_file(&temp, target)?;
        Ok(entries)
    }
}
