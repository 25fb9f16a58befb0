//! Group setup and summary endpoints.

use axum::{extract::State, Extension, Json};

use super::{require_membership, success, ApiResult};
use crate::auth::Principal;
use crate::errors::{codes, AppError};
use crate::models::{Group, SetupRequest};
use crate::validation::is_valid_code;
use crate::AppState;

/// POST /api/setup - Initial group setup.
///
/// Both codes arrive twice from the form; they are validated here before the
/// repository runs the conflict checks and the batched write.
pub async fn setup_group(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<SetupRequest>,
) -> ApiResult<Group> {
    let group_code = request.group_code.trim();
    let confirm_group_code = request.confirm_group_code.trim();
    let admin_code = request.admin_code.trim();
    let confirm_admin_code = request.confirm_admin_code.trim();

    if group_code.is_empty()
        || confirm_group_code.is_empty()
        || admin_code.is_empty()
        || confirm_admin_code.is_empty()
    {
        return Err(AppError::invalid(
            codes::MISSING_FIELDS,
            "All fields are required.",
        ));
    }
    if !is_valid_code(group_code) {
        return Err(AppError::invalid(
            codes::INVALID_CODE,
            "Group Code must be a number between 4 to 7 digits",
        ));
    }
    if !is_valid_code(admin_code) {
        return Err(AppError::invalid(
            codes::INVALID_CODE,
            "Admin Code must be a number between 4 to 7 digits",
        ));
    }
    if group_code != confirm_group_code {
        return Err(AppError::invalid(
            codes::CODE_MISMATCH,
            "Group Codes do not match.",
        ));
    }
    if admin_code != confirm_admin_code {
        return Err(AppError::invalid(
            codes::CODE_MISMATCH,
            "Admin Codes do not match.",
        ));
    }
    if admin_code == group_code {
        return Err(AppError::validation(
            "Admin Code and Group Code cannot be the same.",
        ));
    }

    let group = state
        .repo
        .setup_group(&principal.account_id, group_code, admin_code)
        .await?;

    // Confirmation email is best-effort; a delivery failure never rolls the
    // setup back.
    if let Some(membership) = state.repo.membership_for_account(&principal.account_id).await? {
        let body = format!(
            "Your group is ready. Group code: {}. Admin code: {}.",
            group_code, admin_code
        );
        if let Err(e) = state
            .notifier
            .send(&membership.member.email, "Group setup complete", &body)
        {
            tracing::warn!("Setup confirmation email failed: {}", e);
        }
    }

    success(group)
}

/// GET /api/group - Summary of the caller's group.
pub async fn get_group(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Group> {
    let membership = require_membership(&state, &principal).await?;

    let group = state
        .repo
        .get_group(&membership.group_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Group {} not found", membership.group_id)))?;

    success(group)
}
