mod config;
mod constants;
mod error;
mod routes;

use anyhow::Context;
use formcheck_core::{GeminiGateway, logging};
use log::info;
use std::sync::Arc;

use config::Config;

/// Shared handler state. `G` is the inference backend; the server runs with
/// [`GeminiGateway`], tests substitute their own.
pub struct AppState<G> {
    pub gateway: G,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info");

    let config = Config::from_env()?;
    let gateway = GeminiGateway::new(config.gemini.clone())
        .context("Failed to create Gemini client")?;
    info!(target: "api", "Using model endpoint {}", gateway.endpoint());

    let state = Arc::new(AppState { gateway });
    let app = routes::app(state, config.max_upload_bytes);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(target: "api", "Listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
