//! Edit documents submitted to the rendering service.
//!
//! A slideshow edit is one track of image clips at a fixed per-image
//! duration plus one audio track holding the narration for the full length.

use serde::Serialize;

/// A complete render request body.
#[derive(Debug, Clone, Serialize)]
pub struct Edit {
    pub timeline: Timeline,
    pub output: Output,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub clips: Vec<Clip>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Clip {
    pub asset: Asset,
    pub start: f64,
    pub length: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Asset {
    Image { src: String },
    Audio { src: String },
}

/// Output parameters of the rendered file.
#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub format: String,
    pub resolution: String,
    pub bitrate: String,
    pub frame_rate: u32,
}

/// Render output parameters plus clip pacing.
#[derive(Debug, Clone)]
pub struct EditSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate: String,
    pub per_image_secs: f64,
}

impl Default for EditSpec {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 24,
            bitrate: "8000k".to_string(),
            per_image_secs: 5.0,
        }
    }
}

impl Edit {
    /// Build a slideshow edit from hosted asset URLs.
    ///
    /// Image clips run back to back at `per_image_secs` each; the audio
    /// track spans the whole timeline.
    pub fn slideshow(image_urls: &[String], audio_url: Option<&str>, spec: &EditSpec) -> Self {
        let mut tracks = Vec::new();

        if !image_urls.is_empty() {
            let clips = image_urls
                .iter()
                .enumerate()
                .map(|(idx, src)| Clip {
                    asset: Asset::Image { src: src.clone() },
                    start: idx as f64 * spec.per_image_secs,
                    length: spec.per_image_secs,
                })
                .collect();
            tracks.push(Track { clips });
        }

        if let Some(audio) = audio_url {
            let total = (image_urls.len().max(1)) as f64 * spec.per_image_secs;
            tracks.push(Track {
                clips: vec![Clip {
                    asset: Asset::Audio {
                        src: audio.to_string(),
                    },
                    start: 0.0,
                    length: total,
                }],
            });
        }

        Self {
            timeline: Timeline { tracks },
            output: Output {
                format: "mp4".to_string(),
                resolution: format!("{}x{}", spec.width, spec.height),
                bitrate: spec.bitrate.clone(),
                frame_rate: spec.fps,
            },
        }
    }

    /// Total timeline duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.timeline
            .tracks
            .iter()
            .flat_map(|t| t.clips.iter())
            .map(|c| c.start + c.length)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (1..=n)
            .map(|i| format!("https://cdn.example/scene_{:02}.png", i))
            .collect()
    }

    #[test]
    fn test_slideshow_sequential_starts() {
        let edit = Edit::slideshow(&urls(3), Some("https://cdn.example/n.mp3"), &EditSpec::default());
        let image_track = &edit.timeline.tracks[0];

        assert_eq!(image_track.clips.len(), 3);
        assert_eq!(image_track.clips[0].start, 0.0);
        assert_eq!(image_track.clips[1].start, 5.0);
        assert_eq!(image_track.clips[2].start, 10.0);
    }

    #[test]
    fn test_slideshow_audio_spans_timeline() {
        let edit = Edit::slideshow(&urls(4), Some("https://cdn.example/n.mp3"), &EditSpec::default());
        let audio_track = &edit.timeline.tracks[1];

        assert_eq!(audio_track.clips.len(), 1);
        assert_eq!(audio_track.clips[0].start, 0.0);
        assert_eq!(audio_track.clips[0].length, 20.0);
        assert_eq!(edit.duration_secs(), 20.0);
    }

    #[test]
    fn test_slideshow_without_audio_has_one_track() {
        let edit = Edit::slideshow(&urls(2), None, &EditSpec::default());
        assert_eq!(edit.timeline.tracks.len(), 1);
    }

    #[test]
    fn test_output_block_matches_spec() {
        let spec = EditSpec {
            width: 1280,
            height: 720,
            fps: 30,
            bitrate: "4000k".to_string(),
            per_image_secs: 3.0,
        };
        let edit = Edit::slideshow(&urls(1), None, &spec);
        assert_eq!(edit.output.format, "mp4");
        assert_eq!(edit.output.resolution, "1280x720");
        assert_eq!(edit.output.bitrate, "4000k");
        assert_eq!(edit.output.frame_rate, 30);
    }

    #[test]
    fn test_serialized_asset_carries_type_tag() {
        let edit = Edit::slideshow(&urls(1), Some("https://cdn.example/n.mp3"), &EditSpec::default());
        let json = serde_json::to_value(&edit).unwrap();

        assert_eq!(
            json["timeline"]["tracks"][0]["clips"][0]["asset"]["type"],
            "image"
        );
        assert_eq!(
            json["timeline"]["tracks"][1]["clips"][0]["asset"]["type"],
            "audio"
        );
        // The render callback field is deliberately absent.
        assert!(json.get("callback").is_none());
    }
}
