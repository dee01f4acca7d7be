use crate::guard::TraversalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("blocked by fetch metadata policy")]
    FetchMetadataBlocked,
    #[error("too many requests")]
    RateLimited,
    #[error(transparent)]
    Path(#[from] TraversalError),
    #[error("not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "Unauthorized",
            AppError::Forbidden => "Forbidden",
            AppError::InvalidCredentials => "InvalidCredentials",
            AppError::FetchMetadataBlocked => "FetchMetadataBlocked",
            AppError::RateLimited => "RateLimited",
            AppError::Path(e) => e.code(),
            AppError::NotFound => "NotFound",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::Path(TraversalError::OutsideBase) => StatusCode::FORBIDDEN,
            AppError::FetchMetadataBlocked
            | AppError::Path(TraversalError::MissingInput | TraversalError::InvalidEncoding) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing text. Never carries a filesystem path or internal detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::InvalidCredentials => "Invalid credentials",
            AppError::FetchMetadataBlocked => "blocked by fetch metadata policy",
            AppError::RateLimited => "too many requests",
            AppError::Path(TraversalError::MissingInput) => "filename is required",
            AppError::Path(TraversalError::InvalidEncoding) => "invalid filename",
            AppError::Path(TraversalError::OutsideBase) => "access denied",
            AppError::NotFound => "not found",
            AppError::Internal(_) => "internal error",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "internal error");
        }
        let status = self.status();
        match self {
            // Same shape for every login failure so usernames cannot be probed.
            AppError::InvalidCredentials => {
                (status, Json(json!({"success": false, "message": self.public_message()}))).into_response()
            }
            _ => (status, Json(ErrorBody { error: self.public_message() })).into_response(),
        }
    }
}
