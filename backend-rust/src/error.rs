//! Request errors and their HTTP form.
//!
//! Every failure a client can cause is answered with 400 and the failure
//! envelope `{"status": "failure", "message": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use egress_types::ApiResponse;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Domain(#[from] egress_core::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn message(&self) -> String {
        use egress_core::Error as E;
        match self {
            Self::BadRequest(msg) => msg.clone(),
            Self::Domain(E::NoExitAvailable) => "No available exits".into(),
            Self::Domain(e) if e.is_localization_failure() => format!("Triangulation failed: {e}"),
            Self::Domain(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.message();
        warn!("Request rejected: {message}");
        (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
