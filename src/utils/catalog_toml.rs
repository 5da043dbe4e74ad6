//! Load `.photocat.toml` from the catalog root (CLI only). Lib callers build [`CatalogOpts`] themselves.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::CatalogOpts;
use crate::engine::tools::window_secs_to_ns;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CatalogToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    store: Option<String>,
    backups: Option<String>,
    frames: Option<String>,
    batch_size: Option<usize>,
    thumbnail_max_width: Option<u32>,
    thumbnail_max_height: Option<u32>,
    hash: Option<String>,
    analyse_videos: Option<bool>,
    image_extensions: Option<Vec<String>>,
    video_extensions: Option<Vec<String>>,
    mtime_window: Option<i64>,
    verbose: Option<bool>,
}

/// Load the config file from `dir` if present. Returns None if missing or unreadable.
pub(crate) fn load_catalog_toml(dir: &Path) -> Option<CatalogToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_catalog_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub(crate) fn parse_catalog_toml(s: &str) -> Result<CatalogToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident => $opts_field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $opts.$opts_field = v;
        }
    };
}

fn lowercase_all(v: &[String]) -> Vec<String> {
    v.iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

/// Apply file config to opts (only fields present in the file). Relative paths resolve against the root.
/// Call before applying CLI flags.
pub(crate) fn apply_file_to_opts(file: &CatalogToml, opts: &mut CatalogOpts) {
    let s = &file.settings;
    let root = opts.root.clone();
    let resolve = |p: &str| -> PathBuf {
        let p = PathBuf::from(p);
        if p.is_absolute() { p } else { root.join(p) }
    };
    if let Some(ref p) = s.store {
        opts.store_dir = resolve(p);
    }
    if let Some(ref p) = s.backups {
        opts.backups_dir = resolve(p);
    }
    if let Some(ref p) = s.frames {
        opts.first_frame_dir = resolve(p);
    }
    apply_file_opt!(s, opts, batch_size => batch_size);
    apply_file_opt!(s, opts, thumbnail_max_width => thumbnail_max_width);
    apply_file_opt!(s, opts, thumbnail_max_height => thumbnail_max_height);
    apply_file_opt!(s, opts, analyse_videos => analyse_videos);
    apply_file_opt!(s, opts, verbose => verbose);
    if let Some(ref h) = s.hash {
        match h.parse() {
            Ok(mode) => opts.hash_mode = mode,
            Err(e) => log::warn!("ignoring config hash setting: {e}"),
        }
    }
    if let Some(ref v) = s.image_extensions {
        opts.image_extensions = lowercase_all(v);
    }
    if let Some(ref v) = s.video_extensions {
        opts.video_extensions = lowercase_all(v);
    }
    if let Some(secs) = s.mtime_window {
        match u64::try_from(secs) {
            Ok(secs) => opts.mtime_window_ns = window_secs_to_ns(secs),
            Err(_) => log::warn!("ignoring negative mtime_window: {secs}"),
        }
    }
}
