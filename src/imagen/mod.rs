//! Scene image generation: fal.ai queue client, prompt cache, manifest.

mod cache;
mod client;
mod manifest;

pub use cache::ImageCache;
pub use client::{
    GenerationStatus, ImageClient, ImageParams, ImagenError, QueueResponse,
    DEFAULT_GENERATION_TIMEOUT, DEFAULT_MODEL, FAL_API_BASE_URL, FAL_API_KEY_ENV,
};
pub use manifest::{AssetEntry, AssetManifest, MANIFEST_FILE};

use std::path::{Path, PathBuf};

/// Generate one image per prompt into `images_dir`, writing the manifest.
///
/// Cache hits are copied into place without touching the API. A failed
/// scene is logged and skipped; only zero successes is an error. Returns
/// the local paths of every produced image, in scene order.
pub async fn generate_scene_images(
    client: &ImageClient,
    cache: &ImageCache,
    prompts: &[String],
    params: &ImageParams,
    images_dir: &Path,
) -> Result<Vec<PathBuf>, ImagenError> {
    tokio::fs::create_dir_all(images_dir).await?;

    let mut manifest = AssetManifest::default();
    let mut produced: Vec<PathBuf> = Vec::new();

    for (idx, prompt) in prompts.iter().enumerate() {
        let scene = idx + 1;
        let dest = images_dir.join(format!("scene_{:02}.png", scene));

        if let Some(cached) = cache.get(prompt) {
            log::info!("Scene {}/{}: cache hit", scene, prompts.len());
            tokio::fs::copy(&cached, &dest).await?;
            manifest.images.push(AssetEntry {
                id: format!("scene_{:02}", scene),
                prompt: prompt.clone(),
                model: client.model_str().to_string(),
                url: String::new(),
                path: dest.clone(),
            });
            produced.push(dest);
            continue;
        }

        log::info!("Scene {}/{}: generating image", scene, prompts.len());
        match client
            .generate_to_file(prompt, params, &dest, DEFAULT_GENERATION_TIMEOUT)
            .await
        {
            Ok(url) => {
                if let Err(e) = cache.store(prompt, &dest) {
                    log::warn!("Failed to cache scene {}: {}", scene, e);
                }
                manifest.images.push(AssetEntry {
                    id: format!("scene_{:02}", scene),
                    prompt: prompt.clone(),
                    model: client.model_str().to_string(),
                    url,
                    path: dest.clone(),
                });
                produced.push(dest);
            }
            Err(e) => {
                log::error!("Scene {}/{} failed: {}", scene, prompts.len(), e);
            }
        }
    }

    if produced.is_empty() {
        return Err(ImagenError::ApiError(
            "no scene images could be generated".to_string(),
        ));
    }

    manifest.save(&images_dir.join(MANIFEST_FILE))?;
    Ok(produced)
}
