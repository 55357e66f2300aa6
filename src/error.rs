use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("invalid slug: {0}")]
    InvalidSlug(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("slug '{0}' already exists")]
    SlugCollision(String),
    #[error("slug generation failed: {0}")]
    GenerationFailed(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("link not found")]
    NotFound,
    #[error("limit {requested} exceeds the maximum of {max}")]
    LimitExceeded { requested: usize, max: usize },
    #[error("invalid cursor")]
    InvalidCursor,
}

pub type LinkResult<T> = Result<T, LinkError>;

impl From<StoreError> for LinkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => LinkError::StoreUnavailable(reason),
            StoreError::LimitExceeded { requested, max } => {
                LinkError::LimitExceeded { requested, max }
            }
            StoreError::Corrupt { key, reason } => {
                tracing::error!(key = %key, reason = %reason, "corrupt value in store");
                LinkError::StoreUnavailable(format!("corrupt value under {key}"))
            }
        }
    }
}

impl LinkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LinkError::InvalidSlug(_)
            | LinkError::InvalidUrl(_)
            | LinkError::LimitExceeded { .. }
            | LinkError::InvalidCursor => StatusCode::BAD_REQUEST,
            LinkError::SlugCollision(_) => StatusCode::CONFLICT,
            LinkError::NotFound => StatusCode::NOT_FOUND,
            LinkError::GenerationFailed(_) | LinkError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            LinkError::InvalidSlug(_) => "invalid_slug",
            LinkError::InvalidUrl(_) => "invalid_url",
            LinkError::SlugCollision(_) => "slug_collision",
            LinkError::GenerationFailed(_) => "generation_failed",
            LinkError::StoreUnavailable(_) => "store_unavailable",
            LinkError::NotFound => "not_found",
            LinkError::LimitExceeded { .. } => "limit_exceeded",
            LinkError::InvalidCursor => "invalid_cursor",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }

        let body = ErrorBody {
            error: ErrorInfo {
                code: self.code(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}
