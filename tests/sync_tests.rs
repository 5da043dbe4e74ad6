use anyhow::Result;
use chrono::NaiveDate;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use photocat::engine::FrameExtractor;
use photocat::engine::hashing::hash_bytes;
use photocat::store::{load_folders, open_db};
use photocat::{
    BackupManager, BackupStatus, CatalogChangeEvent, CatalogOpts, CatalogStore, EventSink, HashMode, SyncSummary,
    Synchronizer,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

/// Writes a small JPEG as the "first frame", or fails like a broken video.
#[derive(Default)]
struct FakeExtractor {
    fail: bool,
}

impl FrameExtractor for FakeExtractor {
    fn extract_first_frame(&self, _video: &Path, output: &Path) -> Result<()> {
        if self.fail {
            anyhow::bail!("no video stream");
        }
        solid(64, 48, [200, 10, 10]).save_with_format(output, ImageFormat::Jpeg)?;
        Ok(())
    }
}

struct Fixture {
    tmp: TempDir,
    root: PathBuf,
    opts: CatalogOpts,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("photos");
    std::fs::create_dir_all(&root).unwrap();
    let root = root.canonicalize().unwrap();
    let mut opts = CatalogOpts::for_root(&root);
    opts.batch_size = 100;
    Fixture { tmp, root, opts }
}

fn solid(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(rgb)))
}

fn write_image(path: &Path, seed: u8) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    solid(120, 80, [seed, 255 - seed, seed / 2])
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

fn set_mtime(path: &Path, secs_from_now: u64) {
    let t = SystemTime::now() + Duration::from_secs(secs_from_now);
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(t)
        .unwrap();
}

fn write_four(root: &Path) {
    for (i, name) in ["a.png", "b.png", "c.png", "d.png"].iter().enumerate() {
        write_image(&root.join(name), (i as u8) * 40);
    }
}

fn sync_with(
    store: &mut CatalogStore,
    opts: &CatalogOpts,
    extractor: FakeExtractor,
    cancel: Option<&AtomicBool>,
) -> (Vec<CatalogChangeEvent>, SyncSummary) {
    let mut events = Vec::new();
    let mut sink = |e: &CatalogChangeEvent| events.push(e.clone());
    let summary = Synchronizer::new(opts, store)
        .with_extractor(extractor)
        .with_date(date())
        .synchronize(Some(&mut sink as &mut dyn EventSink), cancel);
    (events, summary)
}

fn sync(opts: &CatalogOpts) -> (Vec<CatalogChangeEvent>, SyncSummary) {
    let mut store = CatalogStore::open(&opts.store_dir).unwrap();
    sync_with(&mut store, opts, FakeExtractor::default(), None)
}

fn reasons(events: &[CatalogChangeEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.reason()).collect()
}

fn asset_reasons(events: &[CatalogChangeEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter(|e| e.is_asset_change())
        .map(|e| e.reason())
        .collect()
}

fn backup_status(events: &[CatalogChangeEvent]) -> Option<BackupStatus> {
    events.iter().find_map(|e| match e {
        CatalogChangeEvent::BackupStatus { status } => Some(*status),
        _ => None,
    })
}

fn inspected_folders(events: &[CatalogChangeEvent]) -> Vec<PathBuf> {
    events
        .iter()
        .filter_map(|e| match e {
            CatalogChangeEvent::InspectingFolder { folder, .. } => Some(folder.clone()),
            _ => None,
        })
        .collect()
}

// --- first run / idempotence ---

#[test]
fn test_first_run_catalogs_everything_and_creates_backup() {
    let f = fixture();
    write_four(&f.root);

    let (events, summary) = sync(&f.opts);
    assert_eq!(
        reasons(&events),
        [
            "InspectingFolder",
            "FolderAdded",
            "AssetAdded",
            "AssetAdded",
            "AssetAdded",
            "AssetAdded",
            "FolderInspected",
            "BackupStatus",
            "End",
        ]
    );
    assert_eq!(backup_status(&events), Some(BackupStatus::Creating));
    assert_eq!(summary.added, 4);
    assert!(!summary.cancelled && !summary.batch_limited && !summary.errored);
    assert!(photocat::backup_exists(&f.opts, date()));

    let store = CatalogStore::open(&f.opts.store_dir).unwrap();
    assert!(!store.has_changes());
    let assets = store.get_assets_by_folder_path(&f.root);
    let names: Vec<&str> = assets.iter().map(|a| a.file_name.as_str()).collect();
    assert_eq!(names, ["a.png", "b.png", "c.png", "d.png"]);
    for a in &assets {
        assert_eq!(a.pixel_size.width, 120);
        assert!(a.thumbnail_size.width <= 200 && a.thumbnail_size.height <= 150);
        assert!(!a.hash.is_empty());
        assert!(a.image_data.is_none());
    }
}

#[test]
fn test_second_run_without_changes_is_idle() {
    let f = fixture();
    write_four(&f.root);
    sync(&f.opts);

    let (events, summary) = sync(&f.opts);
    assert_eq!(
        reasons(&events),
        ["InspectingFolder", "FolderInspected", "BackupStatus", "End"]
    );
    assert_eq!(backup_status(&events), Some(BackupStatus::NoChanges));
    assert_eq!(summary.operations(), 0);
}

#[test]
fn test_asset_events_carry_folder_snapshot() {
    let f = fixture();
    write_four(&f.root);
    let (events, _) = sync(&f.opts);
    let sizes: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            CatalogChangeEvent::AssetAdded {
                folder,
                asset,
                assets_in_folder,
            } => {
                assert_eq!(asset.folder_id, folder.id);
                assert_eq!(folder.path, f.root);
                Some(assets_in_folder.len())
            }
            _ => None,
        })
        .collect();
    assert_eq!(sizes, [1, 2, 3, 4]);
}

// --- deletes and updates ---

#[test]
fn test_deleted_file_is_removed_and_backup_updated() {
    let f = fixture();
    write_four(&f.root);
    sync(&f.opts);

    std::fs::remove_file(f.root.join("c.png")).unwrap();
    let (events, _) = sync(&f.opts);
    let deleted: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CatalogChangeEvent::AssetDeleted {
                asset,
                was_corrupted,
                assets_in_folder,
                ..
            } => Some((asset.file_name.clone(), *was_corrupted, assets_in_folder.len())),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, [("c.png".to_string(), false, 3)]);
    assert_eq!(backup_status(&events), Some(BackupStatus::Updating));

    let store = CatalogStore::open(&f.opts.store_dir).unwrap();
    assert_eq!(store.asset_count(), 3);
}

#[test]
fn test_modified_file_is_updated() {
    let f = fixture();
    write_image(&f.root.join("a.png"), 10);
    sync(&f.opts);
    let before = CatalogStore::open(&f.opts.store_dir)
        .unwrap()
        .get_assets_by_folder_path(&f.root)[0]
        .clone();

    write_image(&f.root.join("a.png"), 250);
    set_mtime(&f.root.join("a.png"), 3600);
    let (events, summary) = sync(&f.opts);
    assert_eq!(summary.updated, 1);
    let updated = events
        .iter()
        .find_map(|e| match e {
            CatalogChangeEvent::AssetUpdated { asset, .. } => Some(asset.clone()),
            _ => None,
        })
        .unwrap();
    assert_ne!(updated.hash, before.hash);
    assert_ne!(updated.modified_ns, before.modified_ns);
}

// --- corruption ---

#[test]
fn test_corrupted_file_is_rejected_never_cataloged() {
    let f = fixture();
    write_image(&f.root.join("good.png"), 1);
    std::fs::write(f.root.join("bad.jpg"), b"this is not a jpeg").unwrap();

    let (events, summary) = sync(&f.opts);
    assert!(events.iter().any(|e| matches!(
        e,
        CatalogChangeEvent::AssetRejected { path, reason }
            if path.ends_with("bad.jpg") && reason.contains("corrupted")
    )));
    assert_eq!(summary.added, 1);
    assert_eq!(summary.rejected, 1);

    let store = CatalogStore::open(&f.opts.store_dir).unwrap();
    let names: Vec<String> = store
        .get_cataloged_assets()
        .into_iter()
        .map(|a| a.file_name)
        .collect();
    assert_eq!(names, ["good.png"]);
}

#[test]
fn test_file_turning_corrupted_is_deleted_as_corrupted() {
    let f = fixture();
    let path = f.root.join("a.png");
    write_image(&path, 1);
    sync(&f.opts);

    std::fs::write(&path, b"garbage").unwrap();
    set_mtime(&path, 3600);
    let (events, _) = sync(&f.opts);
    assert!(events.iter().any(|e| matches!(
        e,
        CatalogChangeEvent::AssetDeleted { asset, was_corrupted: true, .. }
            if asset.file_name == "a.png"
    )));
    let store = CatalogStore::open(&f.opts.store_dir).unwrap();
    assert_eq!(store.asset_count(), 0);
}

// --- batch limit ---

#[test]
fn test_batch_limit_stops_run_and_resumes_next_time() {
    let mut f = fixture();
    write_four(&f.root);
    f.opts.batch_size = 3;

    let (events, summary) = sync(&f.opts);
    assert_eq!(summary.added, 3);
    assert!(summary.batch_limited);
    assert!(!reasons(&events).contains(&"FolderInspected"));
    assert_eq!(reasons(&events).last(), Some(&"End"));
    assert_eq!(backup_status(&events), Some(BackupStatus::Creating));

    let (_, summary) = sync(&f.opts);
    assert_eq!(summary.added, 1);
    assert!(!summary.batch_limited);
    assert_eq!(
        CatalogStore::open(&f.opts.store_dir).unwrap().asset_count(),
        4
    );
}

#[test]
fn test_batch_zero_inspects_without_changing_assets() {
    let mut f = fixture();
    write_four(&f.root);
    f.opts.batch_size = 0;

    let (events, summary) = sync(&f.opts);
    assert_eq!(
        reasons(&events),
        [
            "InspectingFolder",
            "FolderAdded",
            "FolderInspected",
            "BackupStatus",
            "End"
        ]
    );
    assert_eq!(summary.operations(), 0);
    assert_eq!(
        CatalogStore::open(&f.opts.store_dir).unwrap().asset_count(),
        0
    );
}

// --- cancellation ---

#[test]
fn test_cancel_before_start_applies_nothing() {
    let f = fixture();
    write_four(&f.root);
    let cancel = AtomicBool::new(true);
    let mut store = CatalogStore::open(&f.opts.store_dir).unwrap();

    let (events, summary) = sync_with(&mut store, &f.opts, FakeExtractor::default(), Some(&cancel));
    assert_eq!(reasons(&events), ["BackupStatus", "End"]);
    assert!(summary.cancelled);
    assert!(!store.has_changes());
    assert_eq!(store.asset_count(), 0);
}

#[test]
fn test_cancel_mid_run_keeps_changes_pending() {
    let f = fixture();
    write_four(&f.root);
    let cancel = AtomicBool::new(false);
    let mut store = CatalogStore::open(&f.opts.store_dir).unwrap();

    let mut added = 0;
    let mut sink = |e: &CatalogChangeEvent| {
        if matches!(e, CatalogChangeEvent::AssetAdded { .. }) {
            added += 1;
            cancel.store(true, Ordering::Relaxed);
        }
    };
    let summary = Synchronizer::new(&f.opts, &mut store)
        .with_extractor(FakeExtractor::default())
        .with_date(date())
        .synchronize(Some(&mut sink as &mut dyn EventSink), Some(&cancel));
    assert!(summary.cancelled);
    assert_eq!(added, 1);
    assert!(store.has_changes());
    assert_eq!(store.asset_count(), 1);

    // Nothing reached disk.
    let reopened = CatalogStore::open(&f.opts.store_dir).unwrap();
    assert!(reopened.get_folders().is_empty());

    // The next run on the same store persists the pending work.
    cancel.store(false, Ordering::Relaxed);
    let (events, summary) = sync_with(&mut store, &f.opts, FakeExtractor::default(), Some(&cancel));
    assert_eq!(summary.added, 3);
    assert!(!store.has_changes());
    assert_eq!(backup_status(&events), Some(BackupStatus::Updating));
}

// --- folders ---

#[test]
fn test_folders_walked_in_path_order() {
    let f = fixture();
    write_image(&f.root.join("b").join("x.png"), 1);
    write_image(&f.root.join("a").join("y.png"), 2);
    write_image(&f.root.join("a").join("deep").join("z.png"), 3);

    let (events, summary) = sync(&f.opts);
    assert_eq!(
        inspected_folders(&events),
        [
            f.root.clone(),
            f.root.join("a"),
            f.root.join("a").join("deep"),
            f.root.join("b"),
        ]
    );
    assert_eq!(summary.folders_added, 4);
    assert_eq!(summary.added, 3);
}

#[test]
fn test_removed_subfolder_deletes_assets_then_folder() {
    let f = fixture();
    write_image(&f.root.join("trip").join("1.png"), 1);
    write_image(&f.root.join("trip").join("2.png"), 2);
    sync(&f.opts);

    std::fs::remove_dir_all(f.root.join("trip")).unwrap();
    let (events, summary) = sync(&f.opts);
    assert_eq!(
        reasons(&events),
        [
            "InspectingFolder",
            "FolderInspected",
            "InspectingFolder",
            "AssetDeleted",
            "AssetDeleted",
            "FolderDeleted",
            "FolderInspected",
            "BackupStatus",
            "End",
        ]
    );
    assert_eq!(summary.folders_deleted, 1);
    let store = CatalogStore::open(&f.opts.store_dir).unwrap();
    assert!(store.get_folder_by_path(&f.root.join("trip")).is_none());
}

#[test]
fn test_missing_root_never_cataloged_is_a_noop_pass() {
    let f = fixture();
    let mut opts = CatalogOpts::for_root(f.tmp.path().join("nowhere"));
    opts.store_dir = f.tmp.path().join("store");
    opts.backups_dir = f.tmp.path().join("backups");

    let (events, summary) = sync(&opts);
    assert_eq!(
        reasons(&events),
        ["InspectingFolder", "FolderInspected", "BackupStatus", "End"]
    );
    assert!(!summary.errored);
    assert_eq!(backup_status(&events), Some(BackupStatus::Creating));
}

#[test]
fn test_missing_root_previously_cataloged_is_deleted() {
    let f = fixture();
    let mut opts = f.opts.clone();
    opts.store_dir = f.tmp.path().join("store");
    opts.backups_dir = f.tmp.path().join("backups");
    write_image(&f.root.join("a.png"), 1);
    sync(&opts);

    std::fs::remove_dir_all(&f.root).unwrap();
    let (events, summary) = sync(&opts);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.folders_deleted, 1);
    assert_eq!(backup_status(&events), Some(BackupStatus::Updating));
    assert!(
        CatalogStore::open(&opts.store_dir)
            .unwrap()
            .get_folders()
            .is_empty()
    );
}

// --- videos ---

#[test]
fn test_video_is_cataloged_through_its_first_frame() {
    let mut f = fixture();
    f.opts.analyse_videos = true;
    let video_bytes = b"fake mp4 payload".to_vec();
    std::fs::write(f.root.join("clip.mp4"), &video_bytes).unwrap();
    let frames = f.opts.first_frame_dir.clone();

    let (events, summary) = sync(&f.opts);
    assert_eq!(
        reasons(&events),
        [
            "InspectingFolder",
            "FolderAdded",
            "FolderAdded",
            "AssetAdded",
            "FolderInspected",
            "InspectingFolder",
            "FolderInspected",
            "BackupStatus",
            "End",
        ]
    );
    assert_eq!(inspected_folders(&events), [f.root.clone(), frames.clone()]);
    assert_eq!(summary.added, 1);

    let store = CatalogStore::open(&f.opts.store_dir).unwrap();
    let proxies = store.get_assets_by_folder_path(&frames);
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].file_name, "clip.jpg");
    assert_eq!(proxies[0].hash, hash_bytes(&video_bytes));
    assert_eq!(proxies[0].pixel_size.width, 64);
    assert!(frames.join("clip.jpg").is_file());

    // Frame mtime follows the video, so nothing changes next time.
    let (events, summary) = sync(&f.opts);
    assert_eq!(summary.operations(), 0);
    assert_eq!(backup_status(&events), Some(BackupStatus::NoChanges));
}

#[test]
fn test_videos_ignored_when_analysis_off() {
    let f = fixture();
    std::fs::write(f.root.join("clip.mp4"), b"fake").unwrap();
    let (_, summary) = sync(&f.opts);
    assert_eq!(summary.operations(), 0);
    assert!(!f.opts.first_frame_dir.exists());
}

#[test]
fn test_unreadable_video_is_rejected() {
    let mut f = fixture();
    f.opts.analyse_videos = true;
    std::fs::write(f.root.join("clip.mp4"), b"fake").unwrap();
    let mut store = CatalogStore::open(&f.opts.store_dir).unwrap();

    let (events, summary) =
        sync_with(&mut store, &f.opts, FakeExtractor { fail: true }, None);
    assert_eq!(summary.rejected, 1);
    assert!(events.iter().any(|e| matches!(
        e,
        CatalogChangeEvent::AssetRejected { reason, .. } if reason.contains("video is corrupted")
    )));
}

#[test]
fn test_newer_video_regenerates_its_proxy() {
    let mut f = fixture();
    f.opts.analyse_videos = true;
    let video = f.root.join("clip.mp4");
    std::fs::write(&video, b"first cut").unwrap();
    let frames = f.opts.first_frame_dir.clone();
    sync(&f.opts);

    std::fs::write(&video, b"second cut").unwrap();
    set_mtime(&video, 3600);
    let (events, summary) = sync(&f.opts);
    let updated: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CatalogChangeEvent::AssetUpdated { folder, asset, .. } => {
                Some((folder.path.clone(), asset.file_name.clone(), asset.hash.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        updated,
        [(frames, "clip.jpg".to_string(), hash_bytes(b"second cut"))]
    );
    assert_eq!(summary.updated, 1);
    assert_eq!(backup_status(&events), Some(BackupStatus::Updating));

    let (_, summary) = sync(&f.opts);
    assert_eq!(summary.operations(), 0);
}

#[test]
fn test_same_stem_videos_settle_on_the_newest() {
    let mut f = fixture();
    f.opts.analyse_videos = true;
    let older = f.root.join("x").join("clip.mp4");
    let newer = f.root.join("y").join("clip.mp4");
    for (path, bytes) in [(&older, b"older clip"), (&newer, b"newer clip")] {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
    set_mtime(&newer, 100);

    let (events, _) = sync(&f.opts);
    assert_eq!(asset_reasons(&events), ["AssetAdded", "AssetUpdated"]);

    for _ in 0..3 {
        let (events, summary) = sync(&f.opts);
        assert!(asset_reasons(&events).is_empty());
        assert_eq!(summary.operations(), 0);
        assert_eq!(backup_status(&events), Some(BackupStatus::NoChanges));
    }

    let store = CatalogStore::open(&f.opts.store_dir).unwrap();
    let proxies = store.get_assets_by_folder_path(&f.opts.first_frame_dir);
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].hash, hash_bytes(b"newer clip"));
}

// --- errors and backups ---

#[test]
fn test_fatal_error_skips_persist_and_backup() {
    let f = fixture();
    write_image(&f.root.join("a.png"), 1);
    let mut store = CatalogStore::open(&f.opts.store_dir).unwrap();
    let blobs = store.blobs_dir().to_path_buf();
    std::fs::remove_dir_all(&blobs).unwrap();
    std::fs::write(&blobs, b"not a directory").unwrap();

    let (events, summary) = sync_with(&mut store, &f.opts, FakeExtractor::default(), None);
    assert_eq!(
        reasons(&events),
        ["InspectingFolder", "FolderAdded", "Error", "End"]
    );
    assert!(summary.errored);
    assert!(summary.backup.is_none());
    assert!(store.has_changes());
    assert!(!photocat::backup_exists(&f.opts, date()));

    let conn = open_db(&store.tables_dir().join("catalog.db")).unwrap();
    assert!(load_folders(&conn).unwrap().is_empty());
}

#[test]
fn test_deleted_archive_is_recreated() {
    let f = fixture();
    write_four(&f.root);
    sync(&f.opts);
    let (events, _) = sync(&f.opts);
    assert_eq!(backup_status(&events), Some(BackupStatus::NoChanges));

    let archive = BackupManager::new(&f.opts.backups_dir, &f.opts.store_dir).backup_path_for(date());
    std::fs::remove_file(&archive).unwrap();
    let (events, summary) = sync(&f.opts);
    assert_eq!(summary.operations(), 0);
    assert_eq!(backup_status(&events), Some(BackupStatus::Creating));
    assert!(archive.is_file());
}

// --- hashing end to end ---

#[test]
fn test_identical_bytes_share_a_hash_across_folders() {
    let mut f = fixture();
    write_image(&f.root.join("one").join("x.png"), 7);
    std::fs::create_dir_all(f.root.join("two")).unwrap();
    std::fs::copy(f.root.join("one").join("x.png"), f.root.join("two").join("y.png")).unwrap();
    f.opts.hash_mode = HashMode::DHash;

    sync(&f.opts);
    let store = CatalogStore::open(&f.opts.store_dir).unwrap();
    let x = &store.get_assets_by_folder_path(&f.root.join("one"))[0];
    let y = &store.get_assets_by_folder_path(&f.root.join("two"))[0];
    assert_eq!(x.hash, y.hash);
    assert_eq!(x.hash.len(), 16);
}

#[test]
fn test_library_entry_point_without_sink() {
    let f = fixture();
    write_four(&f.root);
    let summary =
        photocat::synchronize(&f.opts, None::<fn(&CatalogChangeEvent)>, None).unwrap();
    assert_eq!(summary.added, 4);
    assert!(summary.backup.is_some());
}
