//! REST API module.
//!
//! Contains all API routes and handlers following the frontend contract.

mod activities;
mod auth;
mod group;
mod ledger;
mod members;

pub use activities::*;
pub use auth::*;
pub use group::*;
pub use ledger::*;
pub use members::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::Principal;
use crate::errors::{codes, AppError};
use crate::models::{Membership, Role};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Resolve the acting principal's group membership, failing with
/// GROUP_UNRESOLVED when the account is not attached to any group.
pub(crate) async fn require_membership(
    state: &AppState,
    principal: &Principal,
) -> Result<Membership, AppError> {
    state
        .repo
        .membership_for_account(&principal.account_id)
        .await?
        .ok_or_else(|| {
            AppError::missing(
                codes::GROUP_UNRESOLVED,
                "Could not determine your group. Please try again later.",
            )
        })
}

/// Resolve membership and require the Admin role.
pub(crate) async fn require_admin(
    state: &AppState,
    principal: &Principal,
) -> Result<Membership, AppError> {
    let membership = require_membership(state, principal).await?;
    if membership.member.role != Role::Admin {
        return Err(AppError::Forbidden(
            "This operation requires an admin".to_string(),
        ));
    }
    Ok(membership)
}
