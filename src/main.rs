mod codegen;
mod config;
mod error;
mod extract;
mod image_gen;
mod images;
mod models;
mod routes;
mod site;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::codegen::CodeGenerator;
use crate::config::Settings;
use crate::image_gen::ImageGenerator;
use crate::images::ImageFetcher;
use crate::routes::{app, AppState};
use crate::site::SiteGenerator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = Settings::from_env().context("invalid configuration")?;
    tracing::info!(
        chat = ?settings.chat.provider,
        image = ?settings.image.provider,
        chat_key_set = !settings.chat.api_key.is_empty(),
        image_key_set = !settings.image.api_key.is_empty(),
        pexels_key_set = !settings.pexels.api_key.is_empty(),
        "Loaded configuration"
    );

    let client = settings.http_client()?;
    let fetcher = Arc::new(ImageFetcher::new(client.clone(), &settings.pexels));
    let image_gen = ImageGenerator::new(
        image_gen::provider_from_settings(client.clone(), &settings.image),
        fetcher.clone(),
    );
    let sites = SiteGenerator::new(
        CodeGenerator::new(codegen::provider_from_settings(client, &settings.chat)),
        settings.output_dir.clone(),
    );
    tracing::info!(output_dir = %sites.output_dir().display(), "Site output directory");

    let state = AppState::new(sites, fetcher, image_gen, settings.logo_dir.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
