//! Asset manifest sidecar for generated images.
//!
//! Downstream steps (remote rendering, uploads) read this file instead of
//! globbing the images directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Manifest file name, written next to the generated images.
pub const MANIFEST_FILE: &str = "generated_assets.json";

/// One generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    pub id: String,
    pub prompt: String,
    pub model: String,
    /// Source URL the image was downloaded from; empty for cache hits.
    #[serde(default)]
    pub url: String,
    pub path: PathBuf,
}

/// The manifest document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetManifest {
    #[serde(default)]
    pub images: Vec<AssetEntry>,
}

impl AssetManifest {
    /// Load a manifest, or an empty one when the file is missing.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Write the manifest to disk.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
    }

    /// Local paths of every image in the manifest.
    pub fn local_paths(&self) -> Vec<PathBuf> {
        self.images.iter().map(|e| e.path.clone()).collect()
    }
}
