//! Photocat: media catalog kept in sync with a directory tree

pub mod backup;
pub mod engine;
pub mod events;
pub mod store;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use backup::BackupManager;
pub use engine::Synchronizer;
pub use events::{ChannelSink, EventSink, NoopSink};
pub use store::CatalogStore;

use chrono::NaiveDate;
use log::debug;
use std::sync::atomic::AtomicBool;

/// Result alias used by public photocat API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: open the store named by `opts`, synchronize it with `opts.root` once,
/// and return the run summary.
///
/// - **`on_event: None`** → no events are built; the summary still reports every count.
/// - **`on_event: Some(f)`** → `f` sees every [`CatalogChangeEvent`] in order, ending with `End`.
///   It runs on the syncing thread; keep it fast or send to a channel.
///
/// Only failing to open the store is an `Err`. Failures during the run arrive as an
/// `Error` event and set [`SyncSummary::errored`].
pub fn synchronize<F>(
    opts: &CatalogOpts,
    on_event: Option<F>,
    cancel: Option<&AtomicBool>,
) -> Result<SyncSummary>
where
    F: FnMut(&CatalogChangeEvent),
{
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
    debug!("{}", config_str);

    let mut store = CatalogStore::open(&opts.store_dir)?;
    let mut sync = Synchronizer::new(opts, &mut store);
    let summary = match on_event {
        None => sync.synchronize(None, cancel),
        Some(mut f) => sync.synchronize(Some(&mut f as &mut dyn EventSink), cancel),
    };
    Ok(summary)
}

/// True when the backup archive dated `date` exists under `opts.backups_dir`.
pub fn backup_exists(opts: &CatalogOpts, date: NaiveDate) -> bool {
    BackupManager::new(&opts.backups_dir, &opts.store_dir).backup_exists(date)
}
