use image::DynamicImage;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::PexelsSettings;
use crate::error::{truncate_for_log, SiteError};
use crate::models::ImageDescriptor;

pub const IMAGES_PER_KEYWORD: usize = 2;
pub const MAX_KEYWORDS: usize = 3;

/// Stock photo search (Pexels-style API). Never fails outward: errors are
/// logged and turn into empty results.
pub struct ImageFetcher {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ImageFetcher {
    pub fn new(client: Client, settings: &PexelsSettings) -> Self {
        Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_images(&self, keyword: &str, count: usize) -> Vec<ImageDescriptor> {
        let keyword = keyword.trim();
        if keyword.is_empty() || count == 0 {
            return Vec::new();
        }
        match self.search(keyword, count, false).await {
            Ok(photos) => {
                let images: Vec<ImageDescriptor> = photos.into_iter().map(Photo::into_descriptor).collect();
                info!("🖼️ Found {} images for '{}'", images.len(), keyword);
                images
            }
            Err(e) => {
                error!("❌ Error fetching images for '{}': {}", keyword, e);
                Vec::new()
            }
        }
    }

    /// One square photo for `term`, downloaded and decoded.
    pub async fn fetch_best_match(&self, term: &str) -> Option<DynamicImage> {
        let term = term.trim();
        if term.is_empty() {
            warn!("⚠️ Empty search term, skipping image search");
            return None;
        }
        match self.download_first(term).await {
            Ok(img) => img,
            Err(e) => {
                error!("❌ Image search fallback failed for '{}': {}", term, e);
                None
            }
        }
    }

    async fn download_first(&self, term: &str) -> Result<Option<DynamicImage>, SiteError> {
        let Some(photo) = self.search(term, 1, true).await?.into_iter().next() else {
            info!("⚠️ No photos found for '{}'", term);
            return Ok(None);
        };

        let response = self.client.get(&photo.src.medium).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SiteError::Upstream { status: status.as_u16(), body: String::new() });
        }
        let bytes = response.bytes().await?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| SiteError::MalformedResponse(format!("image decode failed: {e}")))?;
        info!("✅ Downloaded substitute image {}x{} from {}", img.width(), img.height(), photo.url);
        Ok(Some(img))
    }

    async fn search(&self, query: &str, per_page: usize, square: bool) -> Result<Vec<Photo>, SiteError> {
        let url = format!("{}/search", self.base_url);
        let per_page = per_page.to_string();
        let mut params = vec![("query", query), ("per_page", per_page.as_str())];
        if square {
            params.push(("orientation", "square"));
        }

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SiteError::Upstream { status: status.as_u16(), body: truncate_for_log(&body, 300) });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SiteError::MalformedResponse(e.to_string()))?;
        Ok(parsed.photos)
    }
}

/// Fetches up to `IMAGES_PER_KEYWORD` photos for each of the first
/// `MAX_KEYWORDS` keywords, one keyword after another.
pub async fn collect_content_images(fetcher: &ImageFetcher, keywords: &[String]) -> Vec<ImageDescriptor> {
    let mut images = Vec::new();
    for keyword in keywords.iter().filter(|k| !k.trim().is_empty()).take(MAX_KEYWORDS) {
        images.extend(fetcher.fetch_images(keyword, IMAGES_PER_KEYWORD).await);
    }
    images
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    src: PhotoSrc,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    alt: Option<String>,
    #[serde(default)]
    photographer: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct PhotoSrc { medium: String }

impl Photo {
    fn into_descriptor(self) -> ImageDescriptor {
        let alt_text = match self.alt {
            Some(alt) if !alt.trim().is_empty() => alt,
            _ => self.photographer.clone(),
        };
        ImageDescriptor {
            url: self.src.medium,
            width: self.width,
            height: self.height,
            alt_text,
            photographer_credit: self.photographer,
            source_page_url: self.url,
        }
    }
}
