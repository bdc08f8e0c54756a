use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use image::DynamicImage;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::{ImageProviderKind, ImageSettings};
use crate::error::{truncate_for_log, Result, SiteError};
use crate::images::ImageFetcher;

pub const IMAGE_SIZE: u32 = 512;
pub const IMAGE_SEED: u64 = 0;
pub const IMAGE_STEPS: u32 = 40;

const FILLER_WORDS: [&str; 5] = ["logo", "for", "a", "an", "the"];

/// One text-to-image upstream. Returns the encoded image bytes.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<Bytes>;
}

/// Flux on NVIDIA: JSON envelope carrying base64 image data.
pub struct FluxJsonProvider {
    client: Client,
    url: String,
    api_key: String,
}

impl FluxJsonProvider {
    pub fn new(client: Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, url: url.into(), api_key: api_key.into() }
    }
}

#[derive(Debug, Deserialize)]
struct FluxResponse {
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact { base64: String }

#[async_trait]
impl ImageProvider for FluxJsonProvider {
    fn name(&self) -> &str { "flux-json" }

    async fn generate(&self, prompt: &str) -> Result<Bytes> {
        let body = json!({
            "prompt": prompt,
            "mode": "base",
            "cfg_scale": 3.5,
            "width": IMAGE_SIZE,
            "height": IMAGE_SIZE,
            "seed": IMAGE_SEED,
            "steps": IMAGE_STEPS
        });

        let response = self.client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SiteError::Upstream { status: status.as_u16(), body: truncate_for_log(&body, 300) });
        }

        let parsed: FluxResponse = response
            .json()
            .await
            .map_err(|e| SiteError::MalformedResponse(e.to_string()))?;

        let encoded = parsed
            .image_data
            .or_else(|| parsed.artifacts.into_iter().next().map(|a| a.base64))
            .ok_or_else(|| SiteError::MalformedResponse("no image data in response".into()))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map(Bytes::from)
            .map_err(|e| SiteError::MalformedResponse(format!("bad base64 image: {e}")))
    }
}

/// Hugging Face style inference: the body is the image itself.
pub struct RawBytesProvider {
    client: Client,
    url: String,
    api_key: String,
}

impl RawBytesProvider {
    pub fn new(client: Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, url: url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl ImageProvider for RawBytesProvider {
    fn name(&self) -> &str { "raw-bytes" }

    async fn generate(&self, prompt: &str) -> Result<Bytes> {
        let body = json!({
            "inputs": prompt,
            "parameters": {
                "width": IMAGE_SIZE,
                "height": IMAGE_SIZE,
                "seed": IMAGE_SEED,
                "num_inference_steps": IMAGE_STEPS
            }
        });

        let response = self.client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SiteError::Upstream { status: status.as_u16(), body: truncate_for_log(&body, 300) });
        }
        Ok(response.bytes().await?)
    }
}

pub fn provider_from_settings(client: Client, settings: &ImageSettings) -> Arc<dyn ImageProvider> {
    match settings.provider {
        ImageProviderKind::FluxJson => Arc::new(FluxJsonProvider::new(client, &settings.url, &settings.api_key)),
        ImageProviderKind::RawBytes => Arc::new(RawBytesProvider::new(client, &settings.url, &settings.api_key)),
    }
}

/// Text-to-image with a stock photo search as the second source.
pub struct ImageGenerator {
    provider: Arc<dyn ImageProvider>,
    fetcher: Arc<ImageFetcher>,
}

impl ImageGenerator {
    pub fn new(provider: Arc<dyn ImageProvider>, fetcher: Arc<ImageFetcher>) -> Self {
        Self { provider, fetcher }
    }

    pub async fn generate_image(&self, prompt: &str) -> Option<DynamicImage> {
        info!("🎨 Generating image with {} for prompt: {}", self.provider.name(), truncate_for_log(prompt, 100));

        let generated = match self.provider.generate(prompt).await {
            Ok(bytes) => image::load_from_memory(&bytes)
                .map_err(|e| SiteError::MalformedResponse(format!("image decode failed: {e}"))),
            Err(e) => Err(e),
        };

        match generated {
            Ok(img) => {
                info!("✅ Generated image {}x{}", img.width(), img.height());
                Some(img)
            }
            Err(e) => {
                error!("❌ Image generation failed: {}", e);
                let term = search_term(prompt);
                info!("🔄 Falling back to image search for '{}'", term);
                self.fetcher.fetch_best_match(&term).await
            }
        }
    }
}

/// "Logo for a bakery named Sweet Rolls" -> "bakery named Sweet Rolls".
pub fn search_term(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .filter(|w| !FILLER_WORDS.contains(&w.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}
