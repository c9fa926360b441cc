pub mod analyze;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use formcheck_core::PostureAnalyzer;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes<G: PostureAnalyzer + 'static>() -> Router<Arc<AppState<G>>> {
    Router::new()
        .route("/health", get(health))
        .merge(analyze::routes())
}

/// The full application: routes, body limit and CORS for browser callers.
pub fn app<G: PostureAnalyzer + 'static>(state: Arc<AppState<G>>, max_upload_bytes: usize) -> Router {
    build_routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
