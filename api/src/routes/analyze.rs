//! Posture analysis endpoints (/analyze/frame, /analyze/clip)

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use formcheck_core::{AnalysisRequest, AnalysisResult, CaptureMode, PostureAnalyzer};
use log::info;
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::error::ApiError;

pub fn routes<G: PostureAnalyzer + 'static>() -> Router<Arc<AppState<G>>> {
    Router::new()
        .route("/analyze/frame", post(analyze_frame::<G>))
        .route("/analyze/clip", post(analyze_clip::<G>))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    media: String,
    activity: String,
}

/// POST /analyze/frame - Judge a single still (`data:image/...`)
async fn analyze_frame<G: PostureAnalyzer>(
    State(state): State<Arc<AppState<G>>>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let Json(body) = payload?;
    analyze(&state.gateway, CaptureMode::Frame, body).await.map(Json)
}

/// POST /analyze/clip - Judge a recorded or uploaded clip (`data:video/...`)
async fn analyze_clip<G: PostureAnalyzer>(
    State(state): State<Arc<AppState<G>>>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let Json(body) = payload?;
    analyze(&state.gateway, CaptureMode::Clip, body).await.map(Json)
}

/// Validates before any provider call; invalid requests never reach `gateway`.
async fn analyze<G: PostureAnalyzer>(
    gateway: &G,
    mode: CaptureMode,
    body: AnalyzeBody,
) -> Result<AnalysisResult, ApiError> {
    let request = AnalysisRequest::validate(body.media, &body.activity, mode)?;

    info!(
        target: "api",
        "Analyzing {} for {} ({} bytes)",
        mode.as_str(),
        request.activity(),
        request.media().len()
    );

    Ok(gateway.analyze(&request).await?)
}
