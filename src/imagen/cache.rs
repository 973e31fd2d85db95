//! Disk cache for generated images, keyed by prompt hash.
//!
//! Re-running a pipeline with unchanged prompts must not re-pay the API.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Persistent prompt-keyed image cache.
pub struct ImageCache {
    cache_dir: PathBuf,
}

impl ImageCache {
    /// Cache rooted at an explicit directory.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Cache under the user cache dir: `~/.cache/videoforge/images/`.
    pub fn with_default_dir() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("videoforge")
            .join("images");
        Self::new(cache_dir)
    }

    /// Create the cache directory if missing.
    pub fn ensure_dir_exists(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.cache_dir)
    }

    /// Cached image for a prompt, if present.
    pub fn get(&self, prompt: &str) -> Option<PathBuf> {
        let path = self.cache_dir.join(format!("{}.png", Self::hash_key(prompt)));
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Store a generated image under the prompt's hash.
    pub fn store(&self, prompt: &str, image_path: &Path) -> Result<PathBuf, std::io::Error> {
        self.ensure_dir_exists()?;
        let cached = self.cache_dir.join(format!("{}.png", Self::hash_key(prompt)));
        std::fs::copy(image_path, &cached)?;
        Ok(cached)
    }

    /// Deterministic 32-hex-char key for a prompt (first 16 bytes of SHA-256).
    pub fn hash_key(prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }

    /// The cache directory path.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
