// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::password::HashError;
use crate::auth::token::TokenError;
use crate::storage::StoreError;
use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Incorrect password")]
    InvalidPassword,

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Account store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) | AppError::InvalidPassword => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::AuthRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "AUTH_001",
            AppError::InvalidPassword => "AUTH_002",
            AppError::AuthRateLimited => "AUTH_003",
            AppError::Validation(_) => "VAL_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Conflict(_) => "CONF_001",
            AppError::StoreUnavailable(_) => "STORE_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Auth(_) | AppError::InvalidPassword => "Authentication failed".to_string(),
            AppError::AuthRateLimited => {
                "Too many login attempts, please try again later".to_string()
            },
            AppError::Validation(msg) | AppError::Conflict(msg) => msg.clone(),
            AppError::NotFound(_) => "User not found".to_string(),
            AppError::StoreUnavailable(_) => {
                "Something went wrong, please try later".to_string()
            },
            AppError::Internal(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }

    /// Message shown to the user when a form is rendered back
    pub fn form_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::Conflict(msg) => msg.clone(),
            AppError::NotFound(_) => "User not found".to_string(),
            AppError::InvalidPassword => "Incorrect password".to_string(),
            other => other.sanitized_message(),
        }
    }

    /// Whether the error is recovered locally by re-rendering a form
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::NotFound(_)
                | AppError::Conflict(_)
                | AppError::InvalidPassword
                | AppError::AuthRateLimited
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("account".to_string()),
            StoreError::Conflict(what) => AppError::Conflict(format!("This {what} already exists")),
            StoreError::Unavailable(reason) => AppError::StoreUnavailable(reason),
            StoreError::Io(e) => AppError::Io(e),
            StoreError::Json(e) => AppError::Json(e),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<HashError> for AppError {
    fn from(err: HashError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) | TokenError::WeakSecret(msg) => AppError::Internal(msg),
            other => AppError::Auth(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {err}"))
    }
}
