//! Error responses for route handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use formcheck_core::{INFERENCE_FAILURE_MESSAGE, InferenceError, ValidationError};
use log::{error, warn};
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    /// Body missing, too large, or not the expected JSON.
    Body(JsonRejection),
    Validation(ValidationError),
    Inference(InferenceError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Body(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<InferenceError> for ApiError {
    fn from(e: InferenceError) -> Self {
        ApiError::Inference(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Body(rejection) => {
                warn!(target: "api", "Rejected request body: {}", rejection.body_text());
                (
                    rejection.status(),
                    ErrorBody {
                        error: rejection.body_text(),
                        field: None,
                    },
                )
            }
            ApiError::Validation(e) => {
                warn!(target: "api", "Validation error: {}", e);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorBody {
                        error: e.to_string(),
                        field: Some(e.field()),
                    },
                )
            }
            ApiError::Inference(e) => {
                error!(target: "api", "Inference error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        error: INFERENCE_FAILURE_MESSAGE.to_string(),
                        field: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
