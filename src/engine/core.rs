//! Core synchronization: walk folders, diff them against the catalog, apply the changes.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

use crate::backup::BackupManager;
use crate::events::EventSink;
use crate::store::CatalogStore;
use crate::utils::Colors;
use crate::{AssetKind, CatalogChangeEvent, CatalogOpts, DiskFile, Folder, SyncSummary};

use super::compare::{CatalogedTimes, FolderOp, cataloged_times, compare_folder};
use super::creation::{AssetCreator, CreationOutcome};
use super::tools::{absolutize, disk_file, eligible_kind, is_os_hidden_file, is_under_any};
use super::video::{FfmpegExtractor, FrameExtractor, first_frame_name};

/// Whether the walk goes on after a step.
enum Flow {
    Continue,
    Stop,
}

/// Per-run state: where events go, the cancel flag, counters, and the folder queue.
struct Run<'s> {
    sink: Option<&'s mut dyn EventSink>,
    cancel: Option<&'s AtomicBool>,
    summary: SyncSummary,
    queue: VecDeque<PathBuf>,
    planned: HashSet<PathBuf>,
}

impl<'s> Run<'s> {
    fn new(sink: Option<&'s mut dyn EventSink>, cancel: Option<&'s AtomicBool>) -> Self {
        Self {
            sink,
            cancel,
            summary: SyncSummary::default(),
            queue: VecDeque::new(),
            planned: HashSet::new(),
        }
    }

    /// Build and deliver an event. Nothing is built without a sink.
    fn emit(&mut self, make: impl FnOnce() -> CatalogChangeEvent) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.emit(&make());
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }
}

/// One sync run over `opts.root` against a catalog store.
pub struct Synchronizer<'a> {
    opts: CatalogOpts,
    store: &'a mut CatalogStore,
    extractor: Box<dyn FrameExtractor + 'a>,
    today: Option<NaiveDate>,
}

impl<'a> Synchronizer<'a> {
    /// Paths in `opts` are made absolute; the default frame extractor is `ffmpeg`.
    pub fn new(opts: &CatalogOpts, store: &'a mut CatalogStore) -> Self {
        let mut opts = opts.clone();
        opts.root = absolutize(&opts.root);
        opts.store_dir = absolutize(&opts.store_dir);
        opts.backups_dir = absolutize(&opts.backups_dir);
        opts.first_frame_dir = absolutize(&opts.first_frame_dir);
        Self {
            opts,
            store,
            extractor: Box::new(FfmpegExtractor::default()),
            today: None,
        }
    }

    pub fn with_extractor(mut self, extractor: impl FrameExtractor + 'a) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Fix the backup date instead of using the local calendar day.
    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn opts(&self) -> &CatalogOpts {
        &self.opts
    }

    /// Run once. Every event goes to `sink` in order; the last one is always `End`.
    /// Failures surface as an `Error` event and `errored` in the summary.
    pub fn synchronize<'s>(
        &mut self,
        sink: Option<&'s mut dyn EventSink>,
        cancel: Option<&'s AtomicBool>,
    ) -> SyncSummary {
        let mut run = Run::new(sink, cancel);
        info!("synchronizing {}", self.opts.root.display());

        if let Err(e) = self.walk(&mut run) {
            return self.fail(run, e);
        }

        let changed = if run.summary.cancelled {
            info!("sync cancelled: catalog changes not persisted");
            false
        } else {
            match self.store.persist() {
                Ok(changed) => changed,
                Err(e) => return self.fail(run, e),
            }
        };

        let today = self
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let backups = BackupManager::new(&self.opts.backups_dir, &self.opts.store_dir);
        match backups.run(today, changed) {
            Ok(status) => {
                run.summary.backup = Some(status);
                run.emit(|| CatalogChangeEvent::BackupStatus { status });
            }
            Err(e) => return self.fail(run, e.context("backup failed")),
        }

        log_summary(&run.summary);
        run.emit(|| CatalogChangeEvent::End);
        run.summary
    }

    fn fail(&self, mut run: Run<'_>, e: anyhow::Error) -> SyncSummary {
        error!("sync of {} stopped: {e:#}", self.opts.root.display());
        run.summary.errored = true;
        let error = Arc::new(e);
        run.emit(|| CatalogChangeEvent::Error { error });
        run.emit(|| CatalogChangeEvent::End);
        run.summary
    }

    fn walk(&mut self, run: &mut Run<'_>) -> Result<()> {
        run.queue = self.plan_walk()?;
        run.planned = run.queue.iter().cloned().collect();
        debug!("{} folders planned", run.queue.len());

        while let Some(path) = run.queue.pop_front() {
            if run.is_cancelled() {
                run.summary.cancelled = true;
                return Ok(());
            }
            if let Flow::Stop = self.inspect_folder(&path, run)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Root, its subdirectories on disk, and cataloged folders that may have vanished, in
    /// ascending path order. Store and backup directories are never walked.
    fn plan_walk(&self) -> Result<VecDeque<PathBuf>> {
        let root = &self.opts.root;
        let excluded = [self.opts.store_dir.clone(), self.opts.backups_dir.clone()];
        let mut plan = BTreeSet::new();
        plan.insert(root.clone());

        if root.is_dir() {
            let walker = WalkDir::new(root)
                .min_depth(1)
                .into_iter()
                .filter_entry(|e| !is_under_any(e.path(), &excluded) && !is_os_hidden_file(e.path()));
            for entry in walker {
                let entry = entry.with_context(|| format!("walk {}", root.display()))?;
                if entry.file_type().is_dir() {
                    plan.insert(entry.into_path());
                }
            }
        } else {
            warn!("root {} does not exist", root.display());
        }

        for folder in self.store.get_folders() {
            if folder.path.starts_with(root) || folder.path == self.opts.first_frame_dir {
                plan.insert(folder.path);
            }
        }
        Ok(plan.into_iter().collect())
    }

    fn inspect_folder(&mut self, path: &Path, run: &mut Run<'_>) -> Result<Flow> {
        debug!("inspecting {}", path.display());
        run.emit(|| CatalogChangeEvent::InspectingFolder {
            folder: path.to_path_buf(),
            known_folders: self.store.get_folders(),
        });

        let existing = self.store.get_folder_by_path(path);
        if !path.is_dir() {
            if let Some(folder) = existing
                && let Flow::Stop = self.remove_missing_folder(folder, run)?
            {
                return Ok(Flow::Stop);
            }
        } else {
            let folder = match existing {
                Some(folder) => folder,
                None => self.add_folder(path.to_path_buf(), run),
            };
            if let Flow::Stop = self.sync_folder_assets(&folder, run)? {
                return Ok(Flow::Stop);
            }
        }

        run.emit(|| CatalogChangeEvent::FolderInspected {
            folder: path.to_path_buf(),
        });
        Ok(Flow::Continue)
    }

    fn add_folder(&mut self, path: PathBuf, run: &mut Run<'_>) -> Folder {
        let folder = self.store.add_folder(path);
        run.summary.folders_added += 1;
        debug!("folder added: {}", folder.path.display());
        run.emit(|| CatalogChangeEvent::FolderAdded {
            folder: folder.clone(),
            known_folders: self.store.get_folders(),
        });
        folder
    }

    /// Delete every asset of a vanished folder, then the folder itself.
    fn remove_missing_folder(&mut self, folder: Folder, run: &mut Run<'_>) -> Result<Flow> {
        let assets = self.store.get_assets_by_folder_id(folder.id);
        if !assets.is_empty() && self.opts.batch_size == 0 {
            debug!("batch size 0: keeping vanished {}", folder.path.display());
            return Ok(Flow::Continue);
        }
        for asset in &assets {
            if let Some(flow) = self.check_stop(run) {
                return Ok(flow);
            }
            self.delete_asset(&folder, &asset.file_name, false, run)?;
            if let Some(flow) = self.check_batch(run) {
                return Ok(flow);
            }
        }

        if let Some(removed) = self.store.delete_folder(folder.id) {
            run.summary.folders_deleted += 1;
            debug!("folder deleted: {}", removed.path.display());
            run.emit(|| CatalogChangeEvent::FolderDeleted {
                folder: removed,
                remaining_folders: self.store.get_folders(),
            });
        }
        Ok(Flow::Continue)
    }

    fn sync_folder_assets(&mut self, folder: &Folder, run: &mut Run<'_>) -> Result<Flow> {
        let on_disk = self.list_files(&folder.path)?;
        let cataloged = cataloged_times(&self.store.get_assets_by_folder_id(folder.id));
        let first_frames = if on_disk.iter().any(|f| f.kind == AssetKind::Video) {
            cataloged_times(&self.store.get_assets_by_folder_path(&self.opts.first_frame_dir))
        } else {
            CatalogedTimes::new()
        };
        let ops = compare_folder(&on_disk, &cataloged, &first_frames, self.opts.mtime_window_ns);
        if ops.is_empty() {
            return Ok(Flow::Continue);
        }
        if self.opts.batch_size == 0 {
            debug!(
                "batch size 0: skipping {} operations in {}",
                ops.len(),
                folder.path.display()
            );
            return Ok(Flow::Continue);
        }

        for op in ops {
            if let Some(flow) = self.check_stop(run) {
                return Ok(flow);
            }
            match op {
                FolderOp::Add(file) => self.create_asset(folder, &file, false, run)?,
                FolderOp::Update(file) => self.create_asset(folder, &file, true, run)?,
                FolderOp::Delete(name) => {
                    self.delete_asset(folder, &name, false, run)?;
                }
            }
            if let Some(flow) = self.check_batch(run) {
                return Ok(flow);
            }
        }
        Ok(Flow::Continue)
    }

    fn check_stop(&self, run: &mut Run<'_>) -> Option<Flow> {
        if run.is_cancelled() {
            run.summary.cancelled = true;
            return Some(Flow::Stop);
        }
        None
    }

    fn check_batch(&self, run: &mut Run<'_>) -> Option<Flow> {
        let done = run.summary.operations();
        if self.opts.batch_size > 0 && done >= self.opts.batch_size {
            info!("batch limit of {} operations reached", self.opts.batch_size);
            run.summary.batch_limited = true;
            return Some(Flow::Stop);
        }
        None
    }

    /// Eligible files directly inside `dir`, by file name.
    fn list_files(&self, dir: &Path) -> Result<Vec<DiskFile>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("list {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(kind) = eligible_kind(entry.path(), &self.opts) else {
                continue;
            };
            let meta = entry
                .metadata()
                .with_context(|| format!("metadata of {}", entry.path().display()))?;
            files.push(disk_file(entry.into_path(), &meta, kind));
        }
        Ok(files)
    }

    /// Catalog folder of the video proxies, created and queued on first use.
    fn first_frame_folder(&mut self, run: &mut Run<'_>) -> Folder {
        let dir = self.opts.first_frame_dir.clone();
        let folder = match self.store.get_folder_by_path(&dir) {
            Some(folder) => folder,
            None => self.add_folder(dir.clone(), run),
        };
        if run.planned.insert(dir.clone()) {
            debug!("queued first-frame folder {}", dir.display());
            run.queue.push_back(dir);
        }
        folder
    }

    /// Add or update one file. A corrupted update removes the stale entry instead.
    fn create_asset(
        &mut self,
        folder: &Folder,
        file: &DiskFile,
        is_update: bool,
        run: &mut Run<'_>,
    ) -> Result<()> {
        let outcome = AssetCreator::new(&self.opts, &*self.extractor).create(file)?;
        match outcome {
            CreationOutcome::Ignored => Ok(()),
            CreationOutcome::Rejected { path, reason } => {
                if is_update {
                    let (target, name) = match file.kind {
                        AssetKind::Image => (Some(folder.clone()), file.file_name.clone()),
                        AssetKind::Video => (
                            self.store.get_folder_by_path(&self.opts.first_frame_dir),
                            first_frame_name(&file.file_name),
                        ),
                    };
                    if let Some(target) = target
                        && self.delete_asset(&target, &name, true, run)?
                    {
                        return Ok(());
                    }
                }
                warn!("rejected {}: {reason}", path.display());
                run.summary.rejected += 1;
                run.emit(|| CatalogChangeEvent::AssetRejected { path, reason });
                Ok(())
            }
            CreationOutcome::Created(created) => {
                let target = match created.first_frame {
                    Some(_) => self.first_frame_folder(run),
                    None => folder.clone(),
                };
                let mut asset = created.asset;
                asset.folder_id = target.id;
                self.store.upsert_asset(asset.clone(), created.thumbnail)?;
                let assets_in_folder = || self.store.get_assets_by_folder_id(target.id);
                if is_update {
                    debug!("updated {}", file.path.display());
                    run.summary.updated += 1;
                    run.emit(|| CatalogChangeEvent::AssetUpdated {
                        folder: target.clone(),
                        asset,
                        assets_in_folder: assets_in_folder(),
                    });
                } else {
                    debug!("added {}", file.path.display());
                    run.summary.added += 1;
                    run.emit(|| CatalogChangeEvent::AssetAdded {
                        folder: target.clone(),
                        asset,
                        assets_in_folder: assets_in_folder(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Remove one asset. Returns false when it was not cataloged.
    fn delete_asset(
        &mut self,
        folder: &Folder,
        file_name: &str,
        was_corrupted: bool,
        run: &mut Run<'_>,
    ) -> Result<bool> {
        let Some(asset) = self.store.delete_asset(folder.id, file_name)? else {
            return Ok(false);
        };
        if was_corrupted {
            warn!("removed corrupted {}", folder.path.join(file_name).display());
        } else {
            debug!("deleted {}", folder.path.join(file_name).display());
        }
        run.summary.deleted += 1;
        run.emit(|| CatalogChangeEvent::AssetDeleted {
            folder: folder.clone(),
            asset,
            assets_in_folder: self.store.get_assets_by_folder_id(folder.id),
            was_corrupted,
        });
        Ok(true)
    }
}

/// Log run summary
fn log_summary(summary: &SyncSummary) {
    let stopped = if summary.cancelled {
        " (cancelled)"
    } else if summary.batch_limited {
        " (batch limit reached)"
    } else {
        ""
    };
    info!(
        "{} | {} | {} | rejected: {} | folders +{} -{}{stopped}",
        Colors::colorize(Colors::ADDED, &format!("Added: {}", summary.added)),
        Colors::colorize(Colors::REMOVED, &format!("Deleted: {}", summary.deleted)),
        Colors::colorize(Colors::MODIFIED, &format!("Updated: {}", summary.updated)),
        summary.rejected,
        summary.folders_added,
        summary.folders_deleted,
    );
}
