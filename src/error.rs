/// Unified error types for Session Keeper
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session store (Redis) errors
    #[error("Session store error: {0}")]
    Store(String),

    /// Invalid client input
    #[error("{0}")]
    Validation(String),

    /// Missing or expired credentials, account state rejections
    #[error("{0}")]
    Authentication(String),

    /// Token is malformed or tampered with. Kept apart from `Authentication`
    /// so clients can tell "needs refresh" from "reject outright".
    #[error("{0}")]
    InvalidToken(String),

    /// Revoked tokens, refresh-token mismatch, early reissue
    #[error("{0}")]
    Authorization(String),

    /// Not found errors
    #[error("{0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate account)
    #[error("{0}")]
    Conflict(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Outbound HTTP errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for ServiceError {
    fn from(err: redis::RedisError) -> Self {
        ServiceError::Store(err.to_string())
    }
}

impl ServiceError {
    /// HTTP status this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidToken(_) => StatusCode::PAYMENT_REQUIRED,
            ServiceError::Authorization(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Database(_)
            | ServiceError::Store(_)
            | ServiceError::Internal(_)
            | ServiceError::Http(_)
            | ServiceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

/// Convert ServiceError to HTTP response
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match &self {
            ServiceError::Validation(_) => ("InvalidRequest", self.to_string()),
            ServiceError::Authentication(_) => ("AuthenticationRequired", self.to_string()),
            ServiceError::InvalidToken(_) => ("InvalidToken", self.to_string()),
            ServiceError::Authorization(_) => ("Forbidden", self.to_string()),
            ServiceError::NotFound(_) => ("NotFound", self.to_string()),
            ServiceError::Conflict(_) => ("Conflict", self.to_string()),
            _ => {
                tracing::error!("Request failed: {}", self);
                (
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
