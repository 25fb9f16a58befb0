//! Activity API endpoints: recording, listing, and removal.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{require_admin, require_membership, success, ApiResult};
use crate::auth::Principal;
use crate::errors::{codes, AppError};
use crate::models::{Activity, RecordActivityRequest};
use crate::AppState;

/// POST /api/group/activities - Record an activity with its equal split.
///
/// Recording an activity does not adjust any balances; that stays a separate
/// admin action against the ledger.
pub async fn record_activity(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<RecordActivityRequest>,
) -> ApiResult<Activity> {
    let membership = require_admin(&state, &principal).await?;

    if request.activity_name.trim().is_empty()
        || request.activity_date.trim().is_empty()
        || request.total_expense.trim().is_empty()
    {
        return Err(AppError::invalid(
            codes::INCOMPLETE_ACTIVITY,
            "Please fill out all fields",
        ));
    }
    if request.attendee_ids.is_empty() {
        return Err(AppError::invalid(
            codes::INCOMPLETE_ACTIVITY,
            "Please select at least one member",
        ));
    }
    let total = Decimal::from_str(request.total_expense.trim()).map_err(|_| {
        AppError::invalid(codes::INVALID_AMOUNT, "Please enter a valid amount")
    })?;

    let activity = state
        .repo
        .record_activity(
            &membership.group_id,
            request.activity_name.trim(),
            request.activity_date.trim(),
            total,
            &request.attendee_ids,
        )
        .await?;

    success(activity)
}

/// GET /api/group/activities - List the group's activities.
pub async fn list_activities(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<Activity>> {
    let membership = require_membership(&state, &principal).await?;
    let activities = state.repo.list_activities(&membership.group_id).await?;
    success(activities)
}

/// DELETE /api/group/activities/{name} - Remove an activity by exact name.
///
/// Matches only within the caller's group; with several same-named
/// activities the oldest one goes first.
pub async fn remove_activity(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> ApiResult<Activity> {
    let membership = require_admin(&state, &principal).await?;

    if name.trim().is_empty() {
        return Err(AppError::validation("Please enter an activity name"));
    }

    let removed = state
        .repo
        .remove_activity(&membership.group_id, name.trim())
        .await?;

    success(removed)
}
