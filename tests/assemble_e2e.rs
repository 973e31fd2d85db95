//! End-to-end local assembly through the fallback chain.
//!
//! These tests drive real ffmpeg and skip silently when it is not
//! installed. Inputs are synthesized with ffmpeg itself: lavfi color
//! frames for the slideshow and a sine tone of known duration for the
//! narration track.

use std::path::{Path, PathBuf};
use std::process::Command;

use videoforge::assemble::{assemble, AssemblyOptions};
use videoforge::probe::{audio_duration_secs, Capabilities};

fn caps_with_tools() -> Option<Capabilities> {
    let caps = Capabilities::detect();
    if caps.ffmpeg.is_some() && caps.ffprobe.is_some() {
        Some(caps)
    } else {
        None
    }
}

fn run_ffmpeg(ffmpeg: &Path, args: &[&str]) {
    let status = Command::new(ffmpeg)
        .args(args)
        .status()
        .expect("failed to run ffmpeg");
    assert!(status.success(), "ffmpeg {:?} failed", args);
}

/// Render `count` solid-color frames into `dir` as scene_NN.png.
fn make_images(ffmpeg: &Path, dir: &Path, count: usize) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    let colors = ["red", "green", "blue", "yellow"];
    (1..=count)
        .map(|i| {
            let dest = dir.join(format!("scene_{:02}.png", i));
            run_ffmpeg(
                ffmpeg,
                &[
                    "-f",
                    "lavfi",
                    "-i",
                    &format!("color=c={}:s=320x240:d=0.1", colors[(i - 1) % colors.len()]),
                    "-frames:v",
                    "1",
                    "-y",
                    dest.to_str().unwrap(),
                ],
            );
            dest
        })
        .collect()
}

/// Synthesize a sine tone of `secs` seconds as WAV.
fn make_narration(ffmpeg: &Path, dest: &Path, secs: u32) {
    run_ffmpeg(
        ffmpeg,
        &[
            "-f",
            "lavfi",
            "-i",
            &format!("sine=frequency=440:duration={}", secs),
            "-c:a",
            "pcm_s16le",
            "-y",
            dest.to_str().unwrap(),
        ],
    );
}

/// Read "WxH" of the first video stream.
fn video_resolution(ffprobe: &Path, video: &Path) -> String {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(video)
        .output()
        .expect("failed to run ffprobe");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_slideshow_matches_narration_duration_and_resolution() {
    let Some(caps) = caps_with_tools() else { return };
    let ffmpeg = caps.ffmpeg.clone().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let images = make_images(&ffmpeg, &dir.path().join("images"), 3);
    let narration = dir.path().join("narration.wav");
    make_narration(&ffmpeg, &narration, 6);
    let output = dir.path().join("final_video.mp4");

    let opts = AssemblyOptions {
        width: 640,
        height: 360,
        fps: 24,
        per_image_secs: 2.0,
    };
    let report = assemble(&caps, &images, Some(&narration), &output, &opts).unwrap();

    assert_eq!(report.method, "slideshow");
    assert!(report.has_audio);
    assert!(output.exists());

    // Output duration tracks the narration within a second.
    let measured = audio_duration_secs(&caps, &output).unwrap();
    assert!(
        (measured - 6.0).abs() <= 1.0,
        "expected ~6s, measured {:.2}s",
        measured
    );
    assert_eq!(
        video_resolution(caps.ffprobe.as_deref().unwrap(), &output),
        "640x360"
    );

    // The sidecar records the winning method and target resolution.
    let sidecar = output.with_file_name("video_metadata.json");
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(sidecar).unwrap()).unwrap();
    assert_eq!(doc["method"], "slideshow");
    assert_eq!(doc["resolution"], "640x360");
}

#[test]
fn test_images_only_falls_through_to_silent_slideshow() {
    let Some(caps) = caps_with_tools() else { return };
    let ffmpeg = caps.ffmpeg.clone().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let images = make_images(&ffmpeg, &dir.path().join("images"), 2);
    let output = dir.path().join("final_video.mp4");

    let opts = AssemblyOptions {
        width: 320,
        height: 240,
        fps: 24,
        per_image_secs: 1.0,
    };
    let report = assemble(&caps, &images, None, &output, &opts).unwrap();

    // Without narration the only applicable candidate is the silent one.
    assert_eq!(report.method, "silent-slideshow");
    assert!(!report.has_audio);
    assert_eq!(report.duration_secs, 2.0);
    assert!(output.exists());
}

#[test]
fn test_narration_only_uses_color_background() {
    let Some(caps) = caps_with_tools() else { return };
    let ffmpeg = caps.ffmpeg.clone().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let narration = dir.path().join("narration.wav");
    make_narration(&ffmpeg, &narration, 3);
    let output = dir.path().join("final_video.mp4");

    let opts = AssemblyOptions {
        width: 320,
        height: 240,
        fps: 24,
        per_image_secs: 5.0,
    };
    let report = assemble(&caps, &[], Some(&narration), &output, &opts).unwrap();

    assert_eq!(report.method, "color-background");
    assert!(report.has_audio);

    let measured = audio_duration_secs(&caps, &output).unwrap();
    assert!(
        (measured - 3.0).abs() <= 1.0,
        "expected ~3s, measured {:.2}s",
        measured
    );
}
