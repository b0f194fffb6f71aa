//! Routing-layer errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::generation::{GenerationError, StepId};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller asked for something that does not exist. Never retried.
    #[error("{0}")]
    NotFound(String),

    #[error("store is unavailable")]
    StoreUnavailable,

    #[error(transparent)]
    Internal(#[from] GenerationError),
}

impl ApiError {
    pub fn manual_not_found(manual_id: i32) -> Self {
        Self::NotFound(format!("manual {manual_id} not found"))
    }

    pub fn step_not_found(step: StepId) -> Self {
        Self::NotFound(format!(
            "step {} of manual {} not found",
            step.step_number, step.manual_id
        ))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
