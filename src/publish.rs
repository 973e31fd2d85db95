//! Publishing finished videos to YouTube.
//!
//! OAuth credentials come from a client-secrets file; the access/refresh
//! token pair is cached to a local JSON file across runs and refreshed
//! through the token endpoint when expired. Uploads use the resumable
//! upload protocol.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Default client-secrets file (downloaded from the Google Cloud console).
pub const CREDENTIALS_FILE: &str = "youtube_credentials.json";

/// Default token cache file, persisted across runs.
pub const TOKEN_FILE: &str = "youtube_token.json";

/// Resumable upload endpoint.
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Token refresh endpoint used when the secrets file names none.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Title length limit imposed by the platform.
const MAX_TITLE_CHARS: usize = 95;

/// Description length limit.
const MAX_DESCRIPTION_CHARS: usize = 4800;

/// Refresh tokens this close to expiry, in seconds.
const EXPIRY_SLACK_SECS: u64 = 60;

/// Errors from publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(
        "credentials file not found: {0}\n\n\
         Setup steps:\n\
         1. Go to https://console.cloud.google.com\n\
         2. Enable the YouTube Data API v3\n\
         3. Create OAuth 2.0 credentials (Desktop app)\n\
         4. Download the JSON and save it as 'youtube_credentials.json'"
    )]
    MissingCredentials(String),

    #[error("no valid token: token cache is missing or expired with no refresh token; re-authorize and save a fresh '{TOKEN_FILE}'")]
    NoValidToken,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("failed to parse {path}: {source}")]
    ParseError {
        path: String,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: ClientSecrets,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Cached OAuth token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp after which the access token is stale.
    pub expires_at: u64,
}

impl CachedToken {
    /// Whether the access token is expired (with slack).
    pub fn is_expired(&self, now_unix: u64) -> bool {
        now_unix + EXPIRY_SLACK_SECS >= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// Metadata attached to an upload.
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// `public`, `unlisted` or `private`.
    pub privacy: String,
}

/// Client for publishing videos.
#[derive(Debug)]
pub struct PublishClient {
    http_client: reqwest::Client,
    secrets: ClientSecrets,
    token: CachedToken,
    token_path: PathBuf,
    upload_url: String,
}

impl PublishClient {
    /// Load secrets and the cached token from disk.
    ///
    /// # Errors
    ///
    /// [`PublishError::MissingCredentials`] with setup steps when the
    /// secrets file is absent; [`PublishError::NoValidToken`] when no token
    /// cache exists.
    pub fn load(credentials_path: &Path, token_path: &Path) -> Result<Self, PublishError> {
        let secrets_content = std::fs::read_to_string(credentials_path).map_err(|_| {
            PublishError::MissingCredentials(credentials_path.display().to_string())
        })?;
        let secrets: ClientSecretsFile =
            serde_json::from_str(&secrets_content).map_err(|e| PublishError::ParseError {
                path: credentials_path.display().to_string(),
                source: e,
            })?;

        let token_content =
            std::fs::read_to_string(token_path).map_err(|_| PublishError::NoValidToken)?;
        let token: CachedToken =
            serde_json::from_str(&token_content).map_err(|e| PublishError::ParseError {
                path: token_path.display().to_string(),
                source: e,
            })?;

        Ok(Self {
            http_client: reqwest::Client::new(),
            secrets: secrets.installed,
            token,
            token_path: token_path.to_path_buf(),
            upload_url: UPLOAD_URL.to_string(),
        })
    }

    /// Replace the upload endpoint (mock servers in tests).
    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    /// Refresh the access token when expired and persist the cache.
    pub async fn ensure_fresh_token(&mut self) -> Result<(), PublishError> {
        let now = unix_now();
        if !self.token.is_expired(now) {
            return Ok(());
        }

        let refresh_token = self
            .token
            .refresh_token
            .clone()
            .ok_or(PublishError::NoValidToken)?;

        log::info!("Refreshing expired platform credentials");
        let response = self
            .http_client
            .post(&self.secrets.token_uri)
            .form(&[
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PublishError::ApiError(format!(
                "token refresh failed with status {}: {}",
                status, body
            )));
        }

        let refreshed: RefreshResponse = response.json().await?;
        self.token = CachedToken {
            access_token: refreshed.access_token,
            refresh_token: Some(refresh_token),
            expires_at: unix_now() + refreshed.expires_in,
        };
        self.save_token()?;
        Ok(())
    }

    /// Upload a video; returns the platform video ID.
    pub async fn upload(
        &mut self,
        video_path: &Path,
        meta: &VideoMeta,
    ) -> Result<String, PublishError> {
        self.ensure_fresh_token().await?;

        let file_size = std::fs::metadata(video_path)?.len();
        log::info!(
            "Uploading {} ({:.1}MB)",
            video_path.display(),
            file_size as f64 / 1024.0 / 1024.0
        );

        let snippet = serde_json::json!({
            "snippet": {
                "title": clamp_chars(&meta.title, MAX_TITLE_CHARS),
                "description": clamp_chars(&meta.description, MAX_DESCRIPTION_CHARS),
                "tags": meta.tags,
                "categoryId": "28",
            },
            "status": {
                "privacyStatus": meta.privacy,
            },
        });

        let session = self
            .http_client
            .post(format!(
                "{}?uploadType=resumable&part=snippet,status",
                self.upload_url
            ))
            .bearer_auth(&self.token.access_token)
            .header("X-Upload-Content-Type", "video/mp4")
            .json(&snippet)
            .send()
            .await?;

        if !session.status().is_success() {
            let status = session.status();
            let body = session
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PublishError::ApiError(format!(
                "upload session failed with status {}: {}",
                status, body
            )));
        }

        let session_uri = session
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PublishError::ApiError("upload session returned no location URI".to_string())
            })?;

        let bytes = tokio::fs::read(video_path).await?;
        let response = self
            .http_client
            .put(&session_uri)
            .bearer_auth(&self.token.access_token)
            .header("Content-Type", "video/mp4")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PublishError::ApiError(format!(
                "upload failed with status {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response.json().await?;
        log::info!("Published video {}", uploaded.id);
        Ok(uploaded.id)
    }

    fn save_token(&self) -> Result<(), PublishError> {
        std::fs::write(&self.token_path, serde_json::to_string_pretty(&self.token)?)?;
        Ok(())
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(e: serde_json::Error) -> Self {
        PublishError::ParseError {
            path: String::new(),
            source: e,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn clamp_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
