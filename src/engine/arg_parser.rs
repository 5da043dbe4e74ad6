use clap::Parser;
use std::path::PathBuf;

use crate::HashMode;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Media catalog: thumbnails, hashes and dated backups of a photo tree.
#[derive(Clone, Parser)]
#[command(name = "photocat")]
#[command(about = "Synchronize a media catalog with a directory tree.")]
pub struct Cli {
    /// Directory to catalog. Default: current directory.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Data store directory. Default: `.photocat` in DIR.
    #[arg(long, short)]
    pub store: Option<PathBuf>,

    /// Backup archive directory. Default: `.photocat_backups` in DIR.
    #[arg(long, short)]
    pub backups: Option<PathBuf>,

    /// Output directory for video first frames. Default: `.photocat_frames` in DIR.
    #[arg(long)]
    pub frames: Option<PathBuf>,

    /// Max add/update/delete operations in this run (0 = inspect only).
    #[arg(long, short = 'n', value_parser = clap::value_parser!(usize))]
    pub batch: Option<usize>,

    /// Max thumbnail width in pixels.
    #[arg(long, value_parser = clap::value_parser!(u32))]
    pub thumb_width: Option<u32>,

    /// Max thumbnail height in pixels.
    #[arg(long, value_parser = clap::value_parser!(u32))]
    pub thumb_height: Option<u32>,

    /// Content hash: blake3, dhash or phash.
    #[arg(long, value_parser = clap::value_parser!(HashMode))]
    pub hash: Option<HashMode>,

    /// Catalog videos through their first frame (needs ffmpeg on PATH).
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub videos: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Mtime tolerance window in seconds. Files within this window are considered unchanged.
    #[arg(long, short = 'm', value_parser = clap::value_parser!(u64))]
    pub mtime_window: Option<u64>,

    /// Print every change event as one JSON line on stdout.
    #[arg(long)]
    pub json: bool,
}
