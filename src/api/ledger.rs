//! Ledger API endpoints: balance updates and transaction history.

use axum::{extract::State, Extension, Json};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{require_admin, require_membership, success, ApiResult};
use crate::auth::Principal;
use crate::errors::{codes, AppError};
use crate::models::{BalanceUpdateRequest, BalanceView, EntryType, LedgerEntry};
use crate::AppState;

/// POST /api/group/ledger - Apply a credit or debit to a member.
///
/// The form sends an unsigned magnitude plus a direction; the signed delta
/// is what reaches the repository.
pub async fn balance_update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<BalanceUpdateRequest>,
) -> ApiResult<LedgerEntry> {
    let membership = require_admin(&state, &principal).await?;

    if request.member_id.trim().is_empty() {
        return Err(AppError::validation(
            "Please select a member and enter a valid amount.",
        ));
    }
    let magnitude = Decimal::from_str(request.amount.trim()).map_err(|_| {
        AppError::invalid(codes::INVALID_AMOUNT, "Please enter a valid amount")
    })?;

    let delta = match request.action {
        EntryType::Credit => magnitude,
        EntryType::Debit => -magnitude,
    };

    let entry = state
        .repo
        .apply_transaction(&membership.group_id, &request.member_id, delta, &request.reason)
        .await?;

    success(entry)
}

/// GET /api/group/ledger - Full transaction history, most recent first.
pub async fn list_ledger(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<LedgerEntry>> {
    let membership = require_admin(&state, &principal).await?;
    let entries = state.repo.list_ledger(&membership.group_id).await?;
    success(entries)
}

/// GET /api/group/me/balance - The caller's own balance.
pub async fn my_balance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<BalanceView> {
    let membership = require_membership(&state, &principal).await?;
    let member = membership.member;

    success(BalanceView {
        member_id: member.id,
        first_name: member.first_name,
        last_name: member.last_name,
        amount: member.amount,
    })
}

/// GET /api/group/me/ledger - The caller's own transaction history.
pub async fn my_ledger(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<LedgerEntry>> {
    let membership = require_membership(&state, &principal).await?;
    let entries = state
        .repo
        .list_ledger_for_member(&membership.group_id, &membership.member.id)
        .await?;
    success(entries)
}
