use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests from this IP, please try again later.";

#[derive(Debug, Clone, Error)]
pub enum VerseError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{}", RATE_LIMITED_MESSAGE)]
    RateLimited,
    #[error("Verse source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, VerseError>;

impl VerseError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerseError::Validation(_) => StatusCode::BAD_REQUEST,
            VerseError::NotFound(_) => StatusCode::NOT_FOUND,
            VerseError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            VerseError::Redis(_) => StatusCode::SERVICE_UNAVAILABLE,
            VerseError::SourceUnavailable(_) | VerseError::Config(_) | VerseError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message exposed to clients. Server-side failures are not described in detail.
    fn public_message(&self) -> String {
        match self {
            VerseError::Validation(_) | VerseError::NotFound(_) | VerseError::RateLimited => {
                self.to_string()
            }
            VerseError::Redis(_) => "Service unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<redis::RedisError> for VerseError {
    fn from(err: redis::RedisError) -> Self {
        VerseError::Redis(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl IntoResponse for VerseError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(ErrorResponse::new(self.public_message()))).into_response()
    }
}
