//! Asset uploads to S3.
//!
//! The remote renderer fetches assets over HTTPS, so images and narration
//! are staged in a bucket and addressed by public object URLs.

use std::path::Path;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use serde::{Deserialize, Serialize};

/// Manifest mapping staged assets to their public URLs.
pub const UPLOADED_ASSETS_FILE: &str = "uploaded_assets.json";

/// Errors from asset staging.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage error: {0}")]
    Api(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Bucket coordinates for asset staging.
#[derive(Debug, Clone)]
pub struct StorageTarget {
    pub bucket: String,
    pub region: String,
    /// Key prefix under which assets are placed.
    pub prefix: String,
}

/// S3-backed asset store.
pub struct AssetStore {
    client: aws_sdk_s3::Client,
    target: StorageTarget,
}

impl AssetStore {
    /// Connect using the standard AWS environment credential chain.
    pub async fn connect(target: StorageTarget) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(target.region.clone()))
            .load()
            .await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
            target,
        }
    }

    /// Make sure the bucket exists, creating it when missing.
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        let head = self
            .client
            .head_bucket()
            .bucket(&self.target.bucket)
            .send()
            .await;

        if head.is_ok() {
            log::debug!("Bucket {} exists", self.target.bucket);
            return Ok(());
        }

        log::info!("Creating bucket {}", self.target.bucket);
        let mut create = self.client.create_bucket().bucket(&self.target.bucket);
        if self.target.region != "us-east-1" {
            let constraint = BucketLocationConstraint::from(self.target.region.as_str());
            create = create.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }
        create
            .send()
            .await
            .map_err(|e| StorageError::Api(format!("{}", DisplayErrorContext(&e))))?;
        Ok(())
    }

    /// Upload one file and return its public object URL.
    pub async fn upload_file(&self, path: &Path) -> Result<String, StorageError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
        let key = object_key(&self.target.prefix, file_name);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|_| StorageError::NotFound(path.display().to_string()))?;

        self.client
            .put_object()
            .bucket(&self.target.bucket)
            .key(&key)
            .content_type(content_type_for(path))
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Api(format!("{}", DisplayErrorContext(&e))))?;

        let url = public_url(&self.target.bucket, &self.target.region, &key);
        log::info!("Uploaded {} -> {}", path.display(), url);
        Ok(url)
    }
}

/// Build the object key under a prefix.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Public object URL for a bucket/region/key triple.
pub fn public_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

/// URLs of assets staged for remote rendering, in scene order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadedAssets {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub narration: Option<String>,
}

impl UploadedAssets {
    /// Load the manifest from disk.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| StorageError::Api(format!("invalid assets manifest: {}", e)))
    }

    /// Write the manifest to disk.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::Api(format!("failed to encode assets manifest: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Content type by file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("srt") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
