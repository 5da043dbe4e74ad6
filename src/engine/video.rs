//! Video first-frame extraction. The default extractor shells out to `ffmpeg`.

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::engine::tools::ns_to_system_time;
use crate::utils::config::CatalogDefaults;

/// Produces a still image for the first frame of a video.
pub trait FrameExtractor {
    /// Write the first frame of `video` as an image at `output` (parent directory exists).
    fn extract_first_frame(&self, video: &Path, output: &Path) -> Result<()>;
}

/// Runs `ffmpeg -i <video> -frames:v 1 <output>`.
#[derive(Clone, Debug)]
pub struct FfmpegExtractor {
    pub binary: PathBuf,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl FrameExtractor for FfmpegExtractor {
    fn extract_first_frame(&self, video: &Path, output: &Path) -> Result<()> {
        let status = Command::new(&self.binary)
            .args(["-y", "-v", "error", "-i"])
            .arg(video)
            .args(["-frames:v", "1"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("run {}", self.binary.display()))?;
        if !status.success() {
            bail!(
                "{} could not extract a frame from {} ({status})",
                self.binary.display(),
                video.display()
            );
        }
        if !output.is_file() {
            bail!("no frame written for {}", video.display());
        }
        Ok(())
    }
}

/// Catalog file name of a video's proxy: original stem + image extension.
///
/// Two videos with the same stem map to the same name, wherever they live.
pub fn first_frame_name(video_file_name: &str) -> String {
    let stem = Path::new(video_file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| video_file_name.to_string());
    format!("{stem}.{}", CatalogDefaults::FIRST_FRAME_EXTENSION)
}

pub fn first_frame_path(first_frame_dir: &Path, video_file_name: &str) -> PathBuf {
    first_frame_dir.join(first_frame_name(video_file_name))
}

/// Give the extracted frame the video's modification time so the first-frame folder
/// compares as unchanged on later passes.
pub fn stamp_modified(frame: &Path, modified_ns: i64) -> Result<()> {
    let file = File::options()
        .write(true)
        .open(frame)
        .with_context(|| format!("open {} to set mtime", frame.display()))?;
    file.set_modified(ns_to_system_time(modified_ns))
        .with_context(|| format!("set mtime on {}", frame.display()))?;
    Ok(())
}
