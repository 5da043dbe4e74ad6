//! Progress counter for displaying sync status

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

use crate::CatalogChangeEvent;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " assets"
    )))
}

/// Force a refresh of the bar (e.g. so counter shows "0 assets" immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Update progress bar if available
/// Uses try_lock to avoid blocking if mutex is contended (non-blocking)
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Advance the counter for events that count against the batch limit.
pub fn track_event(pb: &ProgressBar, event: &CatalogChangeEvent) {
    if event.is_asset_change() || matches!(event, CatalogChangeEvent::AssetRejected { .. }) {
        update_progress_bar(pb, 1);
    }
}
