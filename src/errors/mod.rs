//! Error handling module for the dues backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const MEMBER_NOT_FOUND: &str = "MEMBER_NOT_FOUND";
    pub const INVALID_ADMIN_CODE: &str = "INVALID_ADMIN_CODE";
    pub const INVALID_GROUP_CODE: &str = "INVALID_GROUP_CODE";
    pub const GROUP_UNRESOLVED: &str = "GROUP_UNRESOLVED";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const MISSING_FIELDS: &str = "MISSING_FIELDS";
    pub const INVALID_PHONE: &str = "INVALID_PHONE";
    pub const INVALID_EMAIL: &str = "INVALID_EMAIL";
    pub const INVALID_AMOUNT: &str = "INVALID_AMOUNT";
    pub const INVALID_CODE: &str = "INVALID_CODE";
    pub const CODE_MISMATCH: &str = "CODE_MISMATCH";
    pub const INCOMPLETE_ACTIVITY: &str = "INCOMPLETE_ACTIVITY";
    pub const DUPLICATE_NAME: &str = "DUPLICATE_NAME";
    pub const DUPLICATE_PHONE: &str = "DUPLICATE_PHONE";
    pub const DUPLICATE_EMAIL: &str = "DUPLICATE_EMAIL";
    pub const DUPLICATE_ADMIN_CODE: &str = "DUPLICATE_ADMIN_CODE";
    pub const DUPLICATE_GROUP_CODE: &str = "DUPLICATE_GROUP_CODE";
    pub const EMAIL_IN_USE: &str = "EMAIL_IN_USE";
    pub const TRANSACTION_FAILED: &str = "TRANSACTION_FAILED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Email/password or reset token did not match
    InvalidCredentials(String),
    /// Authenticated but not allowed (non-admin on an admin operation)
    Forbidden(String),
    /// Resource not found; code distinguishes member/code/group lookups
    NotFound {
        code: &'static str,
        message: String,
    },
    /// Validation error; code distinguishes phone/email/amount/code failures
    Validation {
        code: &'static str,
        message: String,
    },
    /// Duplicate name/phone/email/code detected before (or by) the write
    Conflict {
        code: &'static str,
        message: String,
    },
    /// Ledger write failed; the transaction was rolled back
    TransactionFailed(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Generic validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            code: codes::VALIDATION_ERROR,
            message: message.into(),
        }
    }

    /// Validation failure with a specific code.
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            code,
            message: message.into(),
        }
    }

    /// Generic not-found failure.
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            code: codes::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Not-found failure with a specific code.
    pub fn missing(code: &'static str, message: impl Into<String>) -> Self {
        AppError::NotFound {
            code,
            message: message.into(),
        }
    }

    /// Conflict failure with a specific code.
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::TransactionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::InvalidCredentials(_) => codes::INVALID_CREDENTIALS,
            AppError::Forbidden(_) => codes::FORBIDDEN,
            AppError::NotFound { code, .. } => code,
            AppError::Validation { code, .. } => code,
            AppError::Conflict { code, .. } => code,
            AppError::TransactionFailed(_) => codes::TRANSACTION_FAILED,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::InvalidCredentials(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound { message, .. } => message.clone(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::Conflict { message, .. } => message.clone(),
            AppError::TransactionFailed(msg) => msg.clone(),
            AppError::Database(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
