// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Global Application Error Enum.
/// Every service and storage operation reports failures through this closed set;
/// `IntoResponse` maps each kind to its HTTP status.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AppError {
    // 400 Bad Request
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least 6 characters long")]
    WeakPassword,

    #[error("Invalid or unknown reset token")]
    InvalidResetToken,

    #[error("{0}")]
    BadRequest(String),

    // 401 Unauthorized
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    TokenExpired,

    #[error("Session is no longer valid")]
    SessionInvalid,

    // 403 Forbidden
    #[error("Forbidden")]
    Forbidden,

    // 404 Not Found
    #[error("User not found")]
    UserNotFound,

    #[error("No account registered with this email")]
    EmailNotFound,

    #[error("{0} not found")]
    NotFound(String),

    // 409 Conflict
    #[error("Email is already registered")]
    EmailTaken,

    // 500 Internal Server Error
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Token and session failures. Callers only ever see a generic "Unauthorized".
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            AppError::MissingToken
                | AppError::MalformedToken
                | AppError::InvalidSignature
                | AppError::TokenExpired
                | AppError::SessionInvalid
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidEmail
            | AppError::WeakPassword
            | AppError::InvalidResetToken
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::MissingToken
            | AppError::MalformedToken
            | AppError::InvalidSignature
            | AppError::TokenExpired
            | AppError::SessionInvalid => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::EmailNotFound | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::EmailTaken => StatusCode::CONFLICT,
            AppError::PersistenceFailure(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::PersistenceFailure(detail) | AppError::Internal(detail) => {
                tracing::error!("Internal Server Error: {}", detail);
                "Internal Server Error".to_string()
            }
            e if e.is_verification_failure() => {
                tracing::warn!(reason = %e, "rejected credentials");
                "Unauthorized".to_string()
            }
            e => e.to_string(),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::PersistenceFailure(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::PersistenceFailure(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::PersistenceFailure(err.to_string())
    }
}

/// Only storage code serializes records, so a JSON failure means a bad write or a corrupt file.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::PersistenceFailure(err.to_string())
    }
}
