//! RenderClient - submits edits to the Shotstack render API and reads
//! job status.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use super::timeline::Edit;

/// Environment variable holding the Shotstack API key.
pub const SHOTSTACK_API_KEY_ENV: &str = "SHOTSTACK_API_KEY";

/// Default API base URL (production stage).
pub const SHOTSTACK_API_BASE_URL: &str = "https://api.shotstack.io/v1";

/// Timeout for submit/status requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the rendered-file download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors from the render service client.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Remote job states as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Fetching,
    Rendering,
    Saving,
    Done,
    Failed,
}

impl JobState {
    fn parse(raw: &str) -> Result<Self, RenderError> {
        match raw.to_lowercase().as_str() {
            "queued" => Ok(JobState::Queued),
            "fetching" => Ok(JobState::Fetching),
            "rendering" => Ok(JobState::Rendering),
            "saving" => Ok(JobState::Saving),
            "done" | "succeeded" => Ok(JobState::Done),
            "failed" => Ok(JobState::Failed),
            other => Err(RenderError::ApiError(format!(
                "unknown render status: {}",
                other
            ))),
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// Snapshot of a render job.
#[derive(Debug, Clone)]
pub struct RenderStatus {
    pub state: JobState,
    /// Render progress percentage as reported by the service.
    pub progress: u8,
    /// Download URL, present once the job is done.
    pub url: Option<String>,
    /// Error text, present when the job failed.
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    progress: Option<u8>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the remote rendering service.
pub struct RenderClient {
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl RenderClient {
    /// Create a client by reading the API key from the environment.
    pub fn new() -> Result<Self, RenderError> {
        let api_key =
            std::env::var(SHOTSTACK_API_KEY_ENV).map_err(|_| RenderError::MissingApiKey)?;
        Self::with_api_key(api_key)
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(api_key: String) -> Result<Self, RenderError> {
        if api_key.is_empty() {
            return Err(RenderError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_key,
            base_url: SHOTSTACK_API_BASE_URL.to_string(),
            http_client,
        })
    }

    /// Replace the base URL (sandbox stage, mock servers in tests).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The configured base URL.
    pub fn base_url_str(&self) -> &str {
        &self.base_url
    }

    /// Submit an edit for rendering; returns the render job ID.
    pub async fn submit(&self, edit: &Edit) -> Result<String, RenderError> {
        let url = format!("{}/render", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(edit)
            .send()
            .await?;

        let status = response.status();
        if !matches!(status.as_u16(), 200 | 201 | 202) {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RenderError::ApiError(format!(
                "render submission failed with status {}: {}",
                status, body
            )));
        }

        let envelope: Envelope<SubmitBody> = response.json().await?;
        Ok(envelope.response.id)
    }

    /// Read the current status of a render job.
    pub async fn status(&self, render_id: &str) -> Result<RenderStatus, RenderError> {
        let url = format!("{}/render/{}", self.base_url, render_id);

        let response = self
            .http_client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RenderError::ApiError(format!(
                "status check failed with status {}: {}",
                status, body
            )));
        }

        let envelope: Envelope<StatusBody> = response.json().await?;
        let body = envelope.response;

        Ok(RenderStatus {
            state: JobState::parse(&body.status)?,
            progress: body.progress.unwrap_or(0),
            url: body.url,
            error: body.error,
        })
    }

    /// Stream the rendered file to disk.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, RenderError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .http_client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RenderError::ApiError(format!(
                "video download failed with status {}",
                status
            )));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let Some(total) = total {
                log::debug!(
                    "Downloaded {:.1}MB ({:.0}%)",
                    downloaded as f64 / 1024.0 / 1024.0,
                    downloaded as f64 / total as f64 * 100.0
                );
            }
        }
        file.flush().await?;

        log::info!(
            "Downloaded {:.1}MB to {}",
            downloaded as f64 / 1024.0 / 1024.0,
            dest.display()
        );
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_api_key_defaults() {
        let client = RenderClient::with_api_key("key".to_string()).unwrap();
        assert_eq!(client.base_url_str(), SHOTSTACK_API_BASE_URL);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(matches!(
            RenderClient::with_api_key(String::new()),
            Err(RenderError::MissingApiKey)
        ));
    }

    #[test]
    fn test_job_state_parse_known_values() {
        assert_eq!(JobState::parse("queued").unwrap(), JobState::Queued);
        assert_eq!(JobState::parse("RENDERING").unwrap(), JobState::Rendering);
        assert_eq!(JobState::parse("done").unwrap(), JobState::Done);
        assert_eq!(JobState::parse("failed").unwrap(), JobState::Failed);
    }

    #[test]
    fn test_job_state_parse_unknown_is_error() {
        assert!(JobState::parse("exploded").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Rendering.is_terminal());
    }
}
