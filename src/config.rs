//! Configuration file handling for videoforge.
//!
//! Loads pipeline settings from `~/.config/videoforge/config.toml` or a
//! custom path. API credentials never live here; they come from the process
//! environment (optionally via `.env`).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Pipeline configuration, all sections optional with defaults.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_per_image_secs")]
    pub per_image_secs: f64,
}

#[derive(Debug, Deserialize, Default)]
pub struct TtsConfig {
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_checks")]
    pub max_checks: u32,
    #[serde(default = "default_bitrate")]
    pub bitrate: String,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_fps() -> u32 {
    24
}

fn default_image_model() -> String {
    "fal-ai/flux/dev".to_string()
}

fn default_per_image_secs() -> f64 {
    5.0
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_checks() -> u32 {
    240
}

fn default_bitrate() -> String {
    "8000k".to_string()
}

fn default_bucket() -> String {
    "videoforge-assets".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_prefix() -> String {
    "assets".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            per_image_secs: default_per_image_secs(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            poll_interval_secs: default_poll_interval(),
            max_checks: default_max_checks(),
            bitrate: default_bitrate(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            prefix: default_prefix(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("videoforge")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output.width, 1920);
        assert_eq!(config.output.height, 1080);
        assert_eq!(config.output.fps, 24);
        assert_eq!(config.images.model, "fal-ai/flux/dev");
        assert_eq!(config.images.per_image_secs, 5.0);
        assert_eq!(config.render.poll_interval_secs, 5);
        assert_eq!(config.render.max_checks, 240);
        assert_eq!(config.storage.region, "us-east-1");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/videoforge.toml"))).unwrap();
        assert_eq!(config.output.fps, 24);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = std::env::temp_dir().join("videoforge-config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "[output]\nwidth = 1280\nheight = 720\n\n[render]\nmax_checks = 10\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.output.width, 1280);
        assert_eq!(config.output.height, 720);
        // Untouched sections keep their defaults.
        assert_eq!(config.output.fps, 24);
        assert_eq!(config.render.max_checks, 10);
        assert_eq!(config.render.poll_interval_secs, 5);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_invalid_file_is_error() {
        let dir = std::env::temp_dir().join("videoforge-config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.toml");
        std::fs::write(&path, "not [valid toml").unwrap();

        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::ParseError { .. })
        ));
        let _ = std::fs::remove_file(&path);
    }
}
