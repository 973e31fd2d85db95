//! Local video assembly via ffmpeg.
//!
//! Three candidate methods are tried in order through the fallback chain:
//! a full slideshow with narration, a solid-color background with narration,
//! and a silent slideshow as the last resort. The winner is recorded in a
//! `video_metadata.json` sidecar next to the output.

use std::path::{Path, PathBuf};

use crate::fallback::{run_chain, Candidate, CandidateFailure, ChainError};
use crate::probe::{audio_duration_secs, Capabilities, ProbeError};
use crate::transcode::Transcoder;

/// Background color for imageless renditions (dark blue-gray).
const BACKGROUND_COLOR: &str = "0x0a0e27";

/// Assembly parameters.
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Seconds each still image stays on screen.
    pub per_image_secs: f64,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 24,
            per_image_secs: 5.0,
        }
    }
}

/// What the chain produced.
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    /// Name of the winning candidate method.
    pub method: String,
    /// The produced video file.
    pub output: PathBuf,
    /// Duration the video was assembled for, in seconds.
    pub duration_secs: f64,
    /// Whether the output carries an audio track.
    pub has_audio: bool,
    /// Failures of the methods attempted before the winner.
    pub failures: Vec<CandidateFailure>,
}

/// Errors from local assembly.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Transcode(#[from] crate::transcode::TranscodeError),

    #[error("nothing to assemble: no images and no narration provided")]
    NoInputs,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Assemble a video from images and/or narration audio.
///
/// Builds the applicable candidate methods for the available inputs and
/// runs them through the fallback chain. At least one of `images` /
/// `narration` must be present, and ffmpeg must be installed.
pub fn assemble(
    caps: &Capabilities,
    images: &[PathBuf],
    narration: Option<&Path>,
    output: &Path,
    opts: &AssemblyOptions,
) -> Result<AssemblyReport, AssembleError> {
    if images.is_empty() && narration.is_none() {
        return Err(AssembleError::NoInputs);
    }
    let ffmpeg = caps.require_ffmpeg()?.to_path_buf();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let duration_secs = match narration {
        Some(audio) => audio_duration_secs(caps, audio)?,
        None => images.len() as f64 * opts.per_image_secs,
    };
    log::info!("Assembling {:.1}s video to {}", duration_secs, output.display());

    // The concat list is shared by the slideshow candidates.
    let concat_list = if images.is_empty() {
        None
    } else {
        let list_path = output.with_extension("frames.txt");
        write_concat_list(&list_path, images, opts.per_image_secs)?;
        Some(list_path)
    };

    let mut candidates: Vec<Candidate> = Vec::new();

    if let (Some(list), Some(audio)) = (&concat_list, narration) {
        let args = build_slideshow_args(list, audio, output, opts);
        let runner = Transcoder::new(ffmpeg.clone());
        candidates.push(Candidate::new("slideshow", move || {
            runner.run(&args).map_err(|e| e.to_string())
        }));
    }

    if let Some(audio) = narration {
        let args = build_color_background_args(audio, output, duration_secs, opts);
        let runner = Transcoder::new(ffmpeg.clone());
        candidates.push(Candidate::new("color-background", move || {
            runner.run(&args).map_err(|e| e.to_string())
        }));
    }

    if let Some(list) = &concat_list {
        let args = build_silent_slideshow_args(list, output, opts);
        let runner = Transcoder::new(ffmpeg.clone());
        candidates.push(Candidate::new("silent-slideshow", move || {
            runner.run(&args).map_err(|e| e.to_string())
        }));
    }

    let report = run_chain(candidates, output)?;

    if let Some(list) = concat_list {
        let _ = std::fs::remove_file(list);
    }

    let has_audio = narration.is_some() && report.winner != "silent-slideshow";
    if !has_audio {
        log::warn!("Output has no audio track (method: {})", report.winner);
    }

    let assembly = AssemblyReport {
        method: report.winner,
        output: output.to_path_buf(),
        duration_secs,
        has_audio,
        failures: report.failures,
    };
    write_metadata_sidecar(&assembly, opts)?;
    Ok(assembly)
}

/// Burn SRT subtitles into a video; the un-subtitled video is the input.
///
/// Subtitle burn-in is cosmetic: callers treat a failure here as non-fatal
/// and keep the original video.
pub fn burn_subtitles(
    caps: &Capabilities,
    video: &Path,
    subtitles: &Path,
    output: &Path,
) -> Result<(), AssembleError> {
    let ffmpeg = caps.require_ffmpeg()?.to_path_buf();
    let args = build_burn_subtitles_args(video, subtitles, output);
    Transcoder::new(ffmpeg).run(&args)?;
    Ok(())
}

/// Write a concat demuxer list: each image with its display duration.
///
/// The final image is repeated without a duration, as the demuxer requires.
pub fn write_concat_list(
    path: &Path,
    images: &[PathBuf],
    per_image_secs: f64,
) -> Result<(), std::io::Error> {
    let mut lines = Vec::with_capacity(images.len() * 2 + 1);
    for image in images {
        lines.push(format!("file '{}'", escape_concat_path(image)));
        lines.push(format!("duration {}", per_image_secs));
    }
    if let Some(last) = images.last() {
        lines.push(format!("file '{}'", escape_concat_path(last)));
    }
    std::fs::write(path, lines.join("\n"))
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

/// ffmpeg args for the full slideshow with narration.
pub fn build_slideshow_args(
    concat_list: &Path,
    narration: &Path,
    output: &Path,
    opts: &AssemblyOptions,
) -> Vec<String> {
    vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        concat_list.to_string_lossy().to_string(),
        "-i".to_string(),
        narration.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("scale={}:{},format=yuv420p", opts.width, opts.height),
        "-r".to_string(),
        opts.fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-shortest".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// ffmpeg args for a solid-color background with narration.
pub fn build_color_background_args(
    narration: &Path,
    output: &Path,
    duration_secs: f64,
    opts: &AssemblyOptions,
) -> Vec<String> {
    vec![
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!(
            "color=c={}:s={}x{}:d={}",
            BACKGROUND_COLOR,
            opts.width,
            opts.height,
            duration_secs.ceil() as u64
        ),
        "-i".to_string(),
        narration.to_string_lossy().to_string(),
        "-r".to_string(),
        opts.fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-shortest".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// ffmpeg args for the silent slideshow (no audio track).
pub fn build_silent_slideshow_args(
    concat_list: &Path,
    output: &Path,
    opts: &AssemblyOptions,
) -> Vec<String> {
    vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        concat_list.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("scale={}:{},format=yuv420p", opts.width, opts.height),
        "-r".to_string(),
        opts.fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-an".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// ffmpeg args for subtitle burn-in.
pub fn build_burn_subtitles_args(video: &Path, subtitles: &Path, output: &Path) -> Vec<String> {
    let escaped = subtitles
        .to_string_lossy()
        .replace(':', "\\:")
        .replace('\'', "\\'");
    vec![
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("subtitles='{}'", escaped),
        "-c:a".to_string(),
        "copy".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Persist the assembly outcome next to the video.
fn write_metadata_sidecar(
    report: &AssemblyReport,
    opts: &AssemblyOptions,
) -> Result<(), std::io::Error> {
    let sidecar = report.output.with_file_name("video_metadata.json");
    let doc = serde_json::json!({
        "status": "complete",
        "method": report.method,
        "duration": report.duration_secs,
        "resolution": format!("{}x{}", opts.width, opts.height),
        "fps": opts.fps,
        "codec": "H.264",
        "audio": if report.has_audio { "AAC" } else { "none" },
    });
    std::fs::write(sidecar, serde_json::to_string_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> AssemblyOptions {
        AssemblyOptions::default()
    }

    #[test]
    fn test_slideshow_args_structure() {
        let args = build_slideshow_args(
            Path::new("/tmp/frames.txt"),
            Path::new("/tmp/narration.mp3"),
            Path::new("/tmp/out.mp4"),
            &opts(),
        );

        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "concat");
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(args.iter().any(|a| a.contains("scale=1920:1080")));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }

    #[test]
    fn test_color_background_args_carry_duration() {
        let args = build_color_background_args(
            Path::new("/tmp/narration.mp3"),
            Path::new("/tmp/out.mp4"),
            12.3,
            &opts(),
        );
        let lavfi = args.iter().find(|a| a.starts_with("color=")).unwrap();
        assert!(lavfi.contains("s=1920x1080"));
        assert!(lavfi.contains("d=13"));
        assert!(lavfi.contains(BACKGROUND_COLOR));
    }

    #[test]
    fn test_silent_slideshow_has_no_audio() {
        let args = build_silent_slideshow_args(
            Path::new("/tmp/frames.txt"),
            Path::new("/tmp/out.mp4"),
            &opts(),
        );
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_burn_subtitles_escapes_filter_path() {
        let args = build_burn_subtitles_args(
            Path::new("/tmp/video.mp4"),
            Path::new("/tmp/dir:with/captions.srt"),
            Path::new("/tmp/out.mp4"),
        );
        let vf = args.iter().find(|a| a.starts_with("subtitles=")).unwrap();
        assert!(vf.contains("\\:"));
    }

    #[test]
    fn test_concat_list_format() {
        let dir = std::env::temp_dir().join("videoforge-concat");
        std::fs::create_dir_all(&dir).unwrap();
        let list = dir.join("frames.txt");
        let images = vec![PathBuf::from("/tmp/a.png"), PathBuf::from("/tmp/b.png")];

        write_concat_list(&list, &images, 5.0).unwrap();
        let content = std::fs::read_to_string(&list).unwrap();

        assert!(content.contains("file '/tmp/a.png'\nduration 5"));
        assert!(content.contains("file '/tmp/b.png'\nduration 5"));
        // Last frame repeated for the concat demuxer.
        assert!(content.trim_end().ends_with("file '/tmp/b.png'"));
        let _ = std::fs::remove_file(&list);
    }

    #[test]
    fn test_assemble_rejects_empty_inputs() {
        let caps = Capabilities::with_paths(Some(PathBuf::from("/usr/bin/ffmpeg")), None);
        let result = assemble(
            &caps,
            &[],
            None,
            Path::new("/tmp/out.mp4"),
            &opts(),
        );
        assert!(matches!(result, Err(AssembleError::NoInputs)));
    }

    #[test]
    fn test_assemble_requires_ffmpeg() {
        let caps = Capabilities::with_paths(None, None);
        let images = vec![PathBuf::from("/tmp/a.png")];
        let result = assemble(&caps, &images, None, Path::new("/tmp/out.mp4"), &opts());
        assert!(matches!(result, Err(AssembleError::Probe(_))));
    }
}
