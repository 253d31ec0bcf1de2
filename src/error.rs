//! API Error Types
//!
//! Centralized error handling for every endpoint. Handlers never catch
//! errors locally: they return `ApiError` and the response is shaped here
//! and finished by [`crate::middleware::error_boundary`].

use axum::{
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;

/// Message shown for any 5xx; the detail only ever reaches the logs and the
/// non-production `stack` field.
const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// API errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not authorized, no token")]
    MissingToken,

    #[error("Not authorized, invalid token")]
    InvalidToken,

    #[error("User already exists")]
    UserExists,

    #[error("Email already in use")]
    EmailInUse,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Not Found - {0}")]
    RouteNotFound(String),

    #[error("Resource not found")]
    ResourceNotFound,

    /// Explicit status hint set by a handler
    #[error("{1}")]
    Status(StatusCode, String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error. A success status hint is never allowed
    /// to leave with an error body and is downgraded to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials | ApiError::MissingToken | ApiError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::UserExists | ApiError::EmailInUse | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UserNotFound | ApiError::RouteNotFound(_) | ApiError::ResourceNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::Status(status, _) if status.is_success() => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Status(status, _) => *status,
            ApiError::Config(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Config(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Error details carried on the response so the boundary layer can render
/// the final body.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub stack: String,
}

impl From<&ApiError> for ErrorReport {
    fn from(err: &ApiError) -> Self {
        Self {
            message: err.public_message(),
            stack: format!("{err:?}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a str>,
}

impl ErrorReport {
    /// Render the JSON body, with `stack` only when requested
    pub fn render(&self, status: StatusCode, include_stack: bool) -> Response {
        let body = ErrorBody {
            message: &self.message,
            stack: include_stack.then_some(self.stack.as_str()),
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self.clone());
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ErrorReport::from(&self).render(self.status_code(), false)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::UserExists,
            // any id-addressed lookup outside the session gate
            StoreError::MalformedId(id) => {
                tracing::debug!(id = %id, "Malformed user id");
                ApiError::ResourceNotFound
            }
            StoreError::Database(msg) => ApiError::Database(msg),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::Database(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        ApiError::Internal(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("JWT error: {:?}", err);
        ApiError::InvalidToken
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!("Blocking task failed: {:?}", err);
        ApiError::Internal(err.to_string())
    }
}
