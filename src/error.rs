use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::meals::repo::StoreError;
use crate::nutrition::LookupError;
use crate::summaries::window::WindowError;

/// Bad input. Never retried, always a 4xx.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("missing or invalid X-Owner-Id header")]
    MissingOwner,

    #[error("nutrition lookup failed: {0}")]
    LookupFailed(#[from] LookupError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid(v) => AppError::Validation(v),
            other => AppError::Store(other),
        }
    }
}

impl From<WindowError> for AppError {
    fn from(e: WindowError) -> Self {
        AppError::Validation(ValidationError(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    kind: &'a str,
    message: String,
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::MissingOwner => (StatusCode::UNAUTHORIZED, "missing_owner"),
            AppError::LookupFailed(LookupError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "lookup_failed")
            }
            AppError::LookupFailed(LookupError::ServiceUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "lookup_failed")
            }
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = if status.is_server_error() {
            error!(error = %self, kind, "request failed");
            // storage internals stay in the logs
            match self {
                AppError::Store(_) => "internal storage error".to_string(),
                other => other.to_string(),
            }
        } else {
            warn!(error = %self, kind, "request rejected");
            self.to_string()
        };
        (status, Json(ErrorBody { error: ErrorDetail { kind, message } })).into_response()
    }
}
