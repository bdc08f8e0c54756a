use axum::{Json, Router, extract::{Path, Query, State}, http::{StatusCode, header}, response::{Html, IntoResponse, Response}, routing::{get, post}};
use base64::Engine;
use parking_lot::RwLock;
use serde_json::json;
use std::{io::Cursor, path::PathBuf, sync::Arc};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    image_gen::ImageGenerator,
    images::{collect_content_images, ImageFetcher, IMAGES_PER_KEYWORD},
    models::{GenerateSiteBody, GeneratedSite, GenerationRequest, HexColor, ImageDescriptor, ImageQuery, LogoInfo, LogoPrompt, LogoUpload},
    site::{compose_preview, SiteGenerator, CSS_FILE, HTML_FILE, JS_FILE},
};

pub const GENERATED_LOGO_FILENAME: &str = "generated_logo.png";
pub const UPLOADED_LOGO_STEM: &str = "uploaded_logo";

#[derive(Clone)]
pub struct AppState {
    pub current: Arc<RwLock<Option<GeneratedSite>>>,
    pub logo_path: Arc<RwLock<Option<PathBuf>>>,
    /// One generation at a time.
    pub generation_lock: Arc<Mutex<()>>,
    pub sites: Arc<SiteGenerator>,
    pub images: Arc<ImageFetcher>,
    pub image_gen: Arc<ImageGenerator>,
    pub logo_dir: PathBuf,
}

impl AppState {
    pub fn new(sites: SiteGenerator, images: Arc<ImageFetcher>, image_gen: ImageGenerator, logo_dir: PathBuf) -> Self {
        Self {
            current: Arc::default(),
            logo_path: Arc::default(),
            generation_lock: Arc::default(),
            sites: Arc::new(sites),
            images,
            image_gen: Arc::new(image_gen),
            logo_dir,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    GenerationFailed,
    ImageUnavailable,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::GenerationFailed => (StatusCode::BAD_GATEWAY, "generation failed".to_string()),
            ApiError::ImageUnavailable => (StatusCode::BAD_GATEWAY, "image generation failed".to_string()),
            ApiError::Internal(m) => {
                tracing::error!("❌ Internal error: {}", m);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self { ApiError::Internal(e.to_string()) }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/site", post(generate_site).get(get_site))
        .route("/api/site/preview", get(preview_site))
        .route("/api/site/files/:name", get(download_file))
        .route("/api/logo", post(upload_logo))
        .route("/api/logo/generate", post(generate_logo))
        .route("/api/images", get(search_images))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

async fn health() -> &'static str { "ok" }

fn parse_color(field: &str, raw: &str) -> Result<HexColor, ApiError> {
    HexColor::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("{field} must be a hex color like #1A2B3C, got '{raw}'")))
}

pub async fn generate_site(State(state): State<AppState>, Json(body): Json<GenerateSiteBody>) -> Result<Json<GeneratedSite>, ApiError> {
    if body.description.trim().is_empty() {
        return Err(ApiError::BadRequest("description is required".into()));
    }
    let main_color = parse_color("main_color", &body.main_color)?;
    let secondary_color = parse_color("secondary_color", &body.secondary_color)?;

    let _guard = state.generation_lock.lock().await;

    let keywords = body.image_keywords.unwrap_or_default();
    let content_images = collect_content_images(&state.images, &keywords).await;
    let logo_path = state.logo_path.read().clone();

    let request = GenerationRequest {
        description: body.description,
        business_name: body.business_name,
        main_color,
        secondary_color,
        logo_path,
        content_images,
    };

    match state.sites.generate_and_process(request).await {
        Ok(site) => {
            *state.current.write() = Some(site.clone());
            Ok(Json(site))
        }
        // Details were logged by the generator; the caller only gets the generic failure.
        Err(_) => Err(ApiError::GenerationFailed),
    }
}

pub async fn get_site(State(state): State<AppState>) -> Response {
    if let Some(site) = state.current.read().clone() { Json(site).into_response() } else { StatusCode::NOT_FOUND.into_response() }
}

pub async fn preview_site(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let site = state.current.read().clone().ok_or(ApiError::NotFound)?;
    Ok(Html(compose_preview(&site)))
}

pub async fn download_file(Path(name): Path<String>, State(state): State<AppState>) -> Result<Response, ApiError> {
    let site = state.current.read().clone().ok_or(ApiError::NotFound)?;
    let (content, mime) = match name.as_str() {
        HTML_FILE => (site.html, "text/html; charset=utf-8"),
        CSS_FILE => (site.css, "text/css; charset=utf-8"),
        JS_FILE => (site.js, "text/javascript; charset=utf-8"),
        _ => return Err(ApiError::NotFound),
    };
    let headers = [
        (header::CONTENT_TYPE, mime.to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
    ];
    Ok((StatusCode::OK, headers, content).into_response())
}

pub async fn upload_logo(State(state): State<AppState>, Json(body): Json<LogoUpload>) -> Result<Json<LogoInfo>, ApiError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body.data_base64.trim())
        .map_err(|e| ApiError::BadRequest(format!("data_base64 is not valid base64: {e}")))?;
    let format = image::guess_format(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("logo is not a supported image: {e}")))?;
    let img = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| ApiError::BadRequest(format!("logo is not a supported image: {e}")))?;

    // The client's name is only informational; storing under it could clobber site files.
    let ext = format.extensions_str().first().copied().unwrap_or("png");
    let path = state.logo_dir.join(format!("{UPLOADED_LOGO_STEM}.{ext}"));
    tokio::fs::create_dir_all(&state.logo_dir).await?;
    tokio::fs::write(&path, &bytes).await?;

    tracing::info!(
        "📎 Stored uploaded logo {} as {} ({}x{})",
        body.filename.as_deref().unwrap_or("<unnamed>"),
        path.display(),
        img.width(),
        img.height()
    );
    *state.logo_path.write() = Some(path.clone());
    Ok(Json(LogoInfo { path, width: img.width(), height: img.height() }))
}

pub async fn generate_logo(State(state): State<AppState>, Json(body): Json<LogoPrompt>) -> Result<Json<LogoInfo>, ApiError> {
    if body.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt is required".into()));
    }
    let img = state.image_gen.generate_image(&body.prompt).await.ok_or(ApiError::ImageUnavailable)?;

    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| ApiError::Internal(format!("png encode failed: {e}")))?;

    tokio::fs::create_dir_all(&state.logo_dir).await?;
    let path = state.logo_dir.join(GENERATED_LOGO_FILENAME);
    tokio::fs::write(&path, png.into_inner()).await?;

    tracing::info!("🎨 Stored generated logo {}", path.display());
    *state.logo_path.write() = Some(path.clone());
    Ok(Json(LogoInfo { path, width: img.width(), height: img.height() }))
}

pub async fn search_images(State(state): State<AppState>, Query(q): Query<ImageQuery>) -> Json<Vec<ImageDescriptor>> {
    let count = q.count.unwrap_or(IMAGES_PER_KEYWORD).min(IMAGES_PER_KEYWORD);
    Json(state.images.fetch_images(&q.keyword, count).await)
}
