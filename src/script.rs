//! Script documents: the structured input every pipeline step consumes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default narration length clamp (~3 minutes at 150 wpm).
pub const DEFAULT_TARGET_WORDS: usize = 450;

/// Image prompt used when a script carries none of its own.
const FALLBACK_IMAGE_PROMPT: &str =
    "Cinematic tech workspace, soft lighting, shallow depth of field";

/// A video script: title, summary and ordered sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// One scene of the script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    #[serde(default)]
    pub narration: String,
    #[serde(default)]
    pub image_prompt: Option<String>,
}

/// Errors loading a script document.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read script file '{path}': {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse script file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("script has no sections")]
    NoSections,
}

impl Script {
    /// Load a script from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path).map_err(|e| ScriptError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let script: Script =
            serde_json::from_str(&content).map_err(|e| ScriptError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        if script.sections.is_empty() {
            return Err(ScriptError::NoSections);
        }
        Ok(script)
    }

    /// Flatten the script into narration text, clamped to `target_words`.
    pub fn narration_text(&self, target_words: usize) -> String {
        let mut lines = vec![self.title.clone()];
        for section in &self.sections {
            if !section.heading.is_empty() {
                lines.push(section.heading.clone());
            }
            if !section.narration.is_empty() {
                lines.push(section.narration.clone());
            }
        }
        let full: String = lines
            .iter()
            .filter(|l| !l.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n");

        let words: Vec<&str> = full.split_whitespace().collect();
        if words.len() > target_words {
            log::info!(
                "Trimming narration from {} to {} words",
                words.len(),
                target_words
            );
            words[..target_words].join(" ")
        } else {
            full
        }
    }

    /// One image prompt per section, with a default when the script has none.
    pub fn image_prompts(&self) -> Vec<String> {
        let prompts: Vec<String> = self
            .sections
            .iter()
            .filter_map(|s| s.image_prompt.clone())
            .filter(|p| !p.trim().is_empty())
            .collect();

        if prompts.is_empty() {
            vec![FALLBACK_IMAGE_PROMPT.to_string()]
        } else {
            prompts
        }
    }
}
