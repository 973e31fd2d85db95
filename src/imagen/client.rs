//! ImageClient - scene image generation through the fal.ai queue API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::retry::{
    backoff_delay, is_transient_network_error, parse_retry_after, DEFAULT_BACKOFF_BASE,
    DEFAULT_BACKOFF_MAX, DEFAULT_NETWORK_RETRIES, DEFAULT_RATE_LIMIT_RETRIES,
};

/// Environment variable holding the fal.ai API key.
pub const FAL_API_KEY_ENV: &str = "FAL_API_KEY";

/// Default base URL for the fal.ai queue API.
pub const FAL_API_BASE_URL: &str = "https://queue.fal.run";

/// Default image model.
pub const DEFAULT_MODEL: &str = "fal-ai/flux/dev";

/// Timeout for individual HTTP requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// End-to-end budget for one image generation.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval between status polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Errors from image generation.
#[derive(Debug, thiserror::Error)]
pub enum ImagenError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("empty prompt")]
    EmptyPrompt,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        /// Retry-After header value in seconds, if provided.
        retry_after_secs: Option<u64>,
    },

    #[error("network error: {message} (after {attempts} attempts)")]
    NetworkError { message: String, attempts: u32 },

    #[error("image generation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Optional generation parameters.
#[derive(Debug, Clone, Default)]
pub struct ImageParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<ImageSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ImageSize {
    width: u32,
    height: u32,
}

/// Response from queue submission.
#[derive(Debug, Deserialize)]
pub struct QueueResponse {
    /// Request ID used for status polling.
    pub request_id: String,
    #[serde(default)]
    pub status_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    images: Option<Vec<ImageOutput>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageOutput {
    url: String,
}

/// State of a queued generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStatus {
    /// Queued, not started.
    Pending,
    /// Being generated.
    InProgress,
    /// Finished; the image is ready to download.
    Completed { image_url: String },
    /// Failed on the server.
    Failed { error: String },
}

/// Client for the fal.ai queue API.
pub struct ImageClient {
    api_key: String,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl ImageClient {
    /// Create a client by reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ImagenError::MissingApiKey`] when `FAL_API_KEY` is unset.
    pub fn new() -> Result<Self, ImagenError> {
        let api_key = std::env::var(FAL_API_KEY_ENV).map_err(|_| ImagenError::MissingApiKey)?;
        Self::with_api_key(api_key)
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(api_key: String) -> Result<Self, ImagenError> {
        if api_key.is_empty() {
            return Err(ImagenError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key,
            base_url: FAL_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            http_client,
        })
    }

    /// Replace the base URL (mock servers in tests).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The configured base URL.
    pub fn base_url_str(&self) -> &str {
        &self.base_url
    }

    /// The configured model.
    pub fn model_str(&self) -> &str {
        &self.model
    }

    /// Submit a generation request to the queue.
    ///
    /// Returns the request ID for status polling.
    ///
    /// # Errors
    ///
    /// [`ImagenError::EmptyPrompt`] for a blank prompt,
    /// [`ImagenError::RateLimit`] on HTTP 429, [`ImagenError::ApiError`] for
    /// other non-success responses, [`ImagenError::HttpError`] when the
    /// request itself fails.
    pub async fn submit(
        &self,
        prompt: &str,
        params: &ImageParams,
    ) -> Result<QueueResponse, ImagenError> {
        if prompt.trim().is_empty() {
            return Err(ImagenError::EmptyPrompt);
        }

        let url = format!("{}/{}", self.base_url, self.model);
        let image_size = match (params.width, params.height) {
            (Some(width), Some(height)) => Some(ImageSize { width, height }),
            _ => None,
        };
        let body = GenerateRequest {
            prompt: prompt.to_string(),
            image_size,
            seed: params.seed,
        };

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Key {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();

            if status.as_u16() == 429 {
                let retry_after_secs = parse_retry_after(&response);
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Rate limit exceeded".to_string());
                log::warn!(
                    "Rate limited by image API. Retry-After: {:?} seconds",
                    retry_after_secs
                );
                return Err(ImagenError::RateLimit {
                    message,
                    retry_after_secs,
                });
            }

            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ImagenError::ApiError(format!(
                "image submission failed with status {}: {}",
                status, text
            )));
        }

        Ok(response.json().await?)
    }

    /// Submit with retries for transient network errors and rate limits.
    ///
    /// Network errors and 429s back off exponentially (honoring Retry-After
    /// for the latter); any other error returns immediately.
    pub async fn submit_with_retry(
        &self,
        prompt: &str,
        params: &ImageParams,
    ) -> Result<QueueResponse, ImagenError> {
        let mut network_attempt = 0u32;
        let mut rate_limit_attempt = 0u32;

        loop {
            match self.submit(prompt, params).await {
                Ok(response) => return Ok(response),

                Err(ImagenError::HttpError(ref e)) if is_transient_network_error(e) => {
                    network_attempt += 1;
                    if network_attempt > DEFAULT_NETWORK_RETRIES {
                        return Err(ImagenError::NetworkError {
                            message: e.to_string(),
                            attempts: network_attempt,
                        });
                    }
                    let delay =
                        backoff_delay(network_attempt - 1, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
                    log::warn!(
                        "Network error (attempt {}/{}): {}. Retrying in {:?}...",
                        network_attempt,
                        DEFAULT_NETWORK_RETRIES + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }

                Err(ImagenError::RateLimit {
                    message,
                    retry_after_secs,
                }) => {
                    rate_limit_attempt += 1;
                    if rate_limit_attempt > DEFAULT_RATE_LIMIT_RETRIES {
                        return Err(ImagenError::RateLimit {
                            message,
                            retry_after_secs,
                        });
                    }
                    let delay = match retry_after_secs {
                        Some(secs) => Duration::from_secs(secs).min(DEFAULT_BACKOFF_MAX),
                        None => backoff_delay(
                            rate_limit_attempt - 1,
                            DEFAULT_BACKOFF_BASE,
                            DEFAULT_BACKOFF_MAX,
                        ),
                    };
                    log::info!(
                        "Rate limited (attempt {}/{}). Retrying in {:?}...",
                        rate_limit_attempt,
                        DEFAULT_RATE_LIMIT_RETRIES + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }

                Err(e) => return Err(e),
            }
        }
    }

    /// Poll the status of a queued request.
    pub async fn poll_status(&self, request_id: &str) -> Result<GenerationStatus, ImagenError> {
        let url = format!(
            "{}/{}/requests/{}/status",
            self.base_url, self.model, request_id
        );

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Key {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ImagenError::ApiError(format!(
                "status check failed with status {}: {}",
                status, text
            )));
        }

        let status_response: StatusResponse = response.json().await?;

        match status_response.status.to_uppercase().as_str() {
            "PENDING" | "IN_QUEUE" => Ok(GenerationStatus::Pending),
            "PROCESSING" | "IN_PROGRESS" => Ok(GenerationStatus::InProgress),
            "COMPLETED" | "OK" => {
                let url = status_response
                    .images
                    .and_then(|mut imgs| {
                        if imgs.is_empty() {
                            None
                        } else {
                            Some(imgs.remove(0).url)
                        }
                    })
                    .ok_or_else(|| {
                        ImagenError::ApiError(
                            "generation completed but no image URL in response".to_string(),
                        )
                    })?;
                Ok(GenerationStatus::Completed { image_url: url })
            }
            "FAILED" | "ERROR" => Ok(GenerationStatus::Failed {
                error: status_response
                    .error
                    .unwrap_or_else(|| "unknown generation error".to_string()),
            }),
            unknown => Err(ImagenError::ApiError(format!(
                "unknown generation status: {}",
                unknown
            ))),
        }
    }

    /// Stream an image from a URL to disk.
    pub async fn download_image(&self, url: &str, dest: &Path) -> Result<PathBuf, ImagenError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ImagenError::ApiError(format!(
                "image download failed with status {}: {}",
                status, text
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(dest.to_path_buf())
    }

    /// Generate one image end to end: submit, poll, download.
    ///
    /// Returns the downloaded image's source URL for the asset manifest.
    pub async fn generate_to_file(
        &self,
        prompt: &str,
        params: &ImageParams,
        dest: &Path,
        timeout: Duration,
    ) -> Result<String, ImagenError> {
        let queued = self.submit_with_retry(prompt, params).await?;
        log::info!("Image generation queued, request_id: {}", queued.request_id);

        let started = tokio::time::Instant::now();
        let image_url = loop {
            if started.elapsed() > timeout {
                log::error!("Image generation timed out after {:?}", timeout);
                return Err(ImagenError::Timeout);
            }

            match self.poll_status(&queued.request_id).await? {
                GenerationStatus::Pending => log::debug!("Status: pending"),
                GenerationStatus::InProgress => log::debug!("Status: generating"),
                GenerationStatus::Completed { image_url } => break image_url,
                GenerationStatus::Failed { error } => {
                    return Err(ImagenError::ApiError(format!(
                        "generation failed: {}",
                        error
                    )));
                }
            }

            tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
        };

        self.download_image(&image_url, dest).await?;
        Ok(image_url)
    }
}
