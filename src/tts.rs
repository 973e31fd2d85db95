//! Narration synthesis through the ElevenLabs text-to-speech API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

/// Environment variable holding the ElevenLabs API key.
pub const ELEVENLABS_API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

/// Default API base URL.
pub const ELEVENLABS_API_BASE_URL: &str = "https://api.elevenlabs.io";

/// Default voice (Rachel).
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Default TTS model.
pub const DEFAULT_MODEL_ID: &str = "eleven_monolingual_v1";

/// Maximum characters submitted in one synthesis request.
pub const MAX_TTS_CHARS: usize = 6000;

/// Fraction of the script kept when retrying after quota exhaustion.
const QUOTA_RETRY_FRACTION: f64 = 0.35;

/// Minimum word count for the shortened retry.
const QUOTA_RETRY_MIN_WORDS: usize = 30;

/// Timeout for a synthesis request; audio generation is slow.
const SYNTH_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from narration synthesis.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("empty narration text")]
    EmptyText,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct SynthesisRequest {
    text: String,
    model_id: String,
}

/// Client for the ElevenLabs TTS API.
pub struct TtsClient {
    api_key: String,
    base_url: String,
    voice_id: String,
    model_id: String,
    http_client: reqwest::Client,
}

impl TtsClient {
    /// Create a client by reading the API key from the environment.
    pub fn new() -> Result<Self, TtsError> {
        let api_key =
            std::env::var(ELEVENLABS_API_KEY_ENV).map_err(|_| TtsError::MissingApiKey)?;
        Self::with_api_key(api_key)
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(api_key: String) -> Result<Self, TtsError> {
        if api_key.is_empty() {
            return Err(TtsError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(SYNTH_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_key,
            base_url: ELEVENLABS_API_BASE_URL.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            http_client,
        })
    }

    /// Replace the base URL (mock servers in tests).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the voice.
    pub fn voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    /// Replace the model.
    pub fn model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// The configured voice ID.
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Synthesize narration and stream the MP3 bytes to `dest`.
    ///
    /// Text is clamped to [`MAX_TTS_CHARS`] before submission. Returns the
    /// number of bytes written.
    ///
    /// # Errors
    ///
    /// [`TtsError::QuotaExhausted`] when the API reports spent credits,
    /// [`TtsError::ApiError`] for other non-success responses.
    pub async fn synthesize(&self, text: &str, dest: &Path) -> Result<u64, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyText);
        }

        let clamped: String = text.chars().take(MAX_TTS_CHARS).collect();
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.base_url, self.voice_id
        );
        log::info!(
            "Synthesizing narration with voice {} ({} chars)",
            self.voice_id,
            clamped.chars().count()
        );

        let response = self
            .http_client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&SynthesisRequest {
                text: clamped,
                model_id: self.model_id.clone(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let lower = body.to_lowercase();
            if lower.contains("quota") || lower.contains("credit") {
                return Err(TtsError::QuotaExhausted(body));
            }
            return Err(TtsError::ApiError(format!(
                "synthesis failed with status {}: {}",
                status, body
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;

        log::info!("Narration saved to {} ({} bytes)", dest.display(), bytes_written);
        Ok(bytes_written)
    }

    /// Synthesize, retrying once with a shortened script on quota exhaustion.
    ///
    /// The retry keeps ~35% of the words (at least 30), matching what the
    /// remaining credits can usually cover.
    pub async fn synthesize_with_quota_fallback(
        &self,
        text: &str,
        dest: &Path,
    ) -> Result<PathBuf, TtsError> {
        match self.synthesize(text, dest).await {
            Ok(_) => Ok(dest.to_path_buf()),
            Err(TtsError::QuotaExhausted(message)) => {
                let shortened = shorten_for_quota(text);
                if shortened.split_whitespace().count() >= text.split_whitespace().count() {
                    return Err(TtsError::QuotaExhausted(message));
                }
                log::warn!("Quota exhausted; retrying with shortened script");
                self.synthesize(&shortened, dest).await?;
                Ok(dest.to_path_buf())
            }
            Err(e) => Err(e),
        }
    }
}

/// Shorten a script for the quota retry: ~35% of the words, minimum 30.
fn shorten_for_quota(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let keep = ((words.len() as f64 * QUOTA_RETRY_FRACTION) as usize).max(QUOTA_RETRY_MIN_WORDS);
    words[..keep.min(words.len())].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_api_key_defaults() {
        let client = TtsClient::with_api_key("key".to_string()).unwrap();
        assert_eq!(client.voice_id(), DEFAULT_VOICE_ID);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(matches!(
            TtsClient::with_api_key(String::new()),
            Err(TtsError::MissingApiKey)
        ));
    }

    #[test]
    fn test_shorten_for_quota_fraction() {
        let text = "word ".repeat(1000);
        let shortened = shorten_for_quota(&text);
        assert_eq!(shortened.split_whitespace().count(), 350);
    }

    #[test]
    fn test_shorten_for_quota_minimum() {
        let text = "word ".repeat(40);
        let shortened = shorten_for_quota(&text);
        // 35% of 40 is 14, below the floor of 30.
        assert_eq!(shortened.split_whitespace().count(), 30);
    }

    #[test]
    fn test_shorten_for_quota_tiny_input() {
        let text = "just a few words";
        assert_eq!(shorten_for_quota(text), text);
    }

    #[tokio::test]
    async fn test_synthesize_rejects_empty_text() {
        let client = TtsClient::with_api_key("key".to_string()).unwrap();
        let result = client.synthesize("  ", Path::new("/tmp/narration.mp3")).await;
        assert!(matches!(result, Err(TtsError::EmptyText)));
    }
}
