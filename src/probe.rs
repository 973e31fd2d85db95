//! Media inspection and startup capability detection.
//!
//! Optional external binaries (ffmpeg, ffprobe) are detected once up front
//! so that later steps can pick candidate methods without probing via
//! failed calls.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Seconds of MP3 audio per megabyte, used when precise probing fails.
pub const ESTIMATE_SECS_PER_MB: f64 = 90.0;

/// Errors that can occur while probing media files.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("ffmpeg not found. Install it with your package manager (e.g. `apt install ffmpeg` or `brew install ffmpeg`)")]
    FfmpegNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// External binaries available on this host.
///
/// Detected once per command and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Resolved ffmpeg path, if installed.
    pub ffmpeg: Option<PathBuf>,
    /// Resolved ffprobe path, if installed.
    pub ffprobe: Option<PathBuf>,
}

impl Capabilities {
    /// Detect available binaries on PATH.
    pub fn detect() -> Self {
        let ffmpeg = which::which("ffmpeg").ok();
        let ffprobe = which::which("ffprobe").ok();
        log::debug!(
            "capabilities: ffmpeg={:?} ffprobe={:?}",
            ffmpeg,
            ffprobe
        );
        Self { ffmpeg, ffprobe }
    }

    /// Build from explicit paths (used in tests).
    pub fn with_paths(ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        Self { ffmpeg, ffprobe }
    }

    /// Require ffmpeg, with a remediation hint when missing.
    pub fn require_ffmpeg(&self) -> Result<&Path, ProbeError> {
        self.ffmpeg.as_deref().ok_or(ProbeError::FfmpegNotFound)
    }
}

/// Deterministic size-based duration estimate in seconds.
///
/// `size_MB * 90`; used whenever the precise duration cannot be read.
pub fn estimate_duration_secs(size_bytes: u64) -> f64 {
    let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
    size_mb * ESTIMATE_SECS_PER_MB
}

/// Read the duration of an audio file in seconds.
///
/// Tries ffprobe first; when ffprobe is unavailable or its output cannot
/// be parsed, falls back to the size estimate. The file must exist.
pub fn audio_duration_secs(caps: &Capabilities, path: &Path) -> Result<f64, ProbeError> {
    let meta = std::fs::metadata(path).map_err(|_| ProbeError::NotFound(path.to_path_buf()))?;

    if let Some(ffprobe) = &caps.ffprobe {
        match ffprobe_duration(ffprobe, path) {
            Some(secs) => return Ok(secs),
            None => {
                log::warn!(
                    "ffprobe could not read duration of {}, using size estimate",
                    path.display()
                );
            }
        }
    }

    Ok(estimate_duration_secs(meta.len()))
}

/// Run ffprobe and parse the container duration. Any failure yields None.
fn ffprobe_duration(ffprobe: &Path, media: &Path) -> Option<f64> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(media)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let secs: f64 = text.trim().parse().ok()?;
    if secs.is_finite() && secs > 0.0 {
        Some(secs)
    } else {
        None
    }
}
