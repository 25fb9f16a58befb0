//! Accounts and sessions: Argon2id password hashing, opaque bearer tokens,
//! and the session middleware protecting the group routes.
//!
//! Reset tokens are compared in constant time to mitigate timing attacks.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::db::Repository;
use crate::errors::{AppError, ErrorResponse};

/// The authenticated caller, inserted into request extensions by the session
/// middleware.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: String,
    /// The bearer token the caller presented; logout needs it back.
    pub token: String,
}

/// Hash a password with Argon2id and a random salt, producing a PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid stored hash: {}", e)))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("Verification failed: {}", e))),
    }
}

/// Generate an opaque token for sessions and password resets.
pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Constant-time comparison for reset tokens.
pub fn tokens_match(provided: &str, stored: &str) -> bool {
    provided.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// Session middleware: resolves the bearer token to an account and attaches
/// the `Principal` to the request.
pub async fn session_auth_layer(repo: Arc<Repository>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let Some(token) = token else {
        return unauthorized_response("Missing bearer token");
    };

    match repo.find_session(&token).await {
        Ok(Some(account_id)) => {
            let mut request = request;
            request.extensions_mut().insert(Principal { account_id, token });
            next.run(request).await
        }
        Ok(None) => unauthorized_response("Invalid or expired session"),
        Err(e) => {
            tracing::error!("Session lookup failed: {}", e);
            let err = AppError::Internal("Session lookup failed".to_string());
            (err.status_code(), Json(ErrorResponse::new(&err))).into_response()
        }
    }
}

/// Create an unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    let err = AppError::Unauthorized(message.to_string());
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(&err))).into_response()
}
