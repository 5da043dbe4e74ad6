//! Per-folder change detection: files on disk vs assets in the catalog.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::engine::tools::mtime_changed;
use crate::engine::video::first_frame_name;
use crate::{Asset, AssetKind, DiskFile};

/// One step of a folder diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FolderOp {
    /// On disk, not cataloged.
    Add(DiskFile),
    /// On disk and cataloged, modification time differs.
    Update(DiskFile),
    /// Cataloged, gone from disk.
    Delete(String),
}

impl FolderOp {
    /// Sort key: the file name the op is about.
    pub fn file_name(&self) -> &str {
        match self {
            FolderOp::Add(f) | FolderOp::Update(f) => &f.file_name,
            FolderOp::Delete(name) => name,
        }
    }
}

/// Modification times of cataloged assets keyed by file name.
pub type CatalogedTimes = HashMap<String, i64>;

pub fn cataloged_times<'a>(assets: impl IntoIterator<Item = &'a Asset>) -> CatalogedTimes {
    assets
        .into_iter()
        .map(|a| (a.file_name.clone(), a.modified_ns))
        .collect()
}

/// A proxy carries the mtime of the video it was last extracted from. Same-stem videos share
/// one proxy, so only a video newer than that mtime replaces it; the newest one wins and
/// later passes settle.
fn video_is_newer(video_mtime: i64, proxy_mtime: i64, mtime_window_ns: i64) -> bool {
    video_mtime > proxy_mtime && mtime_changed(video_mtime, proxy_mtime, mtime_window_ns)
}

/// Diff one folder. Images join on their own file name against `cataloged`; videos join on
/// their first-frame name against `first_frames` (the first-frame folder's assets). Only
/// `cataloged` entries can produce deletes. Result is in ascending file name order.
pub fn compare_folder(
    on_disk: &[DiskFile],
    cataloged: &CatalogedTimes,
    first_frames: &CatalogedTimes,
    mtime_window_ns: i64,
) -> Vec<FolderOp> {
    let mut ops: BTreeMap<String, FolderOp> = BTreeMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for file in on_disk {
        let changed = match file.kind {
            AssetKind::Image => {
                seen.insert(file.file_name.as_str());
                cataloged
                    .get(&file.file_name)
                    .map(|old| mtime_changed(file.modified_ns, *old, mtime_window_ns))
            }
            AssetKind::Video => first_frames
                .get(&first_frame_name(&file.file_name))
                .map(|old| video_is_newer(file.modified_ns, *old, mtime_window_ns)),
        };
        match changed {
            None => {
                ops.insert(file.file_name.clone(), FolderOp::Add(file.clone()));
            }
            Some(true) => {
                ops.insert(file.file_name.clone(), FolderOp::Update(file.clone()));
            }
            Some(false) => {}
        }
    }

    for name in cataloged.keys() {
        if !seen.contains(name.as_str()) {
            ops.insert(name.clone(), FolderOp::Delete(name.clone()));
        }
    }

    ops.into_values().collect()
}
