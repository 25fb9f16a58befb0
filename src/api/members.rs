//! Member API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{require_admin, require_membership, success, ApiResult};
use crate::auth::Principal;
use crate::errors::{codes, AppError};
use crate::models::{CreateMemberRequest, Member, UpdateMemberRequest};
use crate::validation::{is_valid_email, is_valid_phone, normalize_email, normalize_phone};
use crate::AppState;

/// Member fields in normalized form plus the parsed balance.
struct MemberFields {
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    amount: Decimal,
}

/// Validate and normalize the member form fields.
fn validate_member_fields(
    first_name: &str,
    last_name: &str,
    phone: &str,
    email: &str,
    amount: &str,
) -> Result<MemberFields, AppError> {
    if first_name.trim().is_empty()
        || last_name.trim().is_empty()
        || phone.trim().is_empty()
        || email.trim().is_empty()
        || amount.trim().is_empty()
    {
        return Err(AppError::invalid(
            codes::MISSING_FIELDS,
            "All fields are required.",
        ));
    }
    if !is_valid_phone(phone) {
        return Err(AppError::invalid(
            codes::INVALID_PHONE,
            "Please enter a valid 10-digit phone number!",
        ));
    }
    if !is_valid_email(email.trim()) {
        return Err(AppError::invalid(
            codes::INVALID_EMAIL,
            "Please enter a valid email!",
        ));
    }
    let amount = Decimal::from_str(amount.trim()).map_err(|_| {
        AppError::invalid(codes::INVALID_AMOUNT, "Please enter a valid amount")
    })?;

    Ok(MemberFields {
        first_name: first_name.trim().to_string(),
        last_name: last_name.trim().to_string(),
        email: normalize_email(email),
        phone: normalize_phone(phone),
        amount,
    })
}

/// GET /api/group/members - List all members of the caller's group.
pub async fn list_members(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<Member>> {
    let membership = require_membership(&state, &principal).await?;
    let members = state.repo.list_members(&membership.group_id).await?;
    success(members)
}

/// GET /api/group/members/{id} - Get a single member.
pub async fn get_member(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Member> {
    let membership = require_membership(&state, &principal).await?;

    let member = state
        .repo
        .get_member(&membership.group_id, &id)
        .await?
        .ok_or_else(|| {
            AppError::missing(codes::MEMBER_NOT_FOUND, format!("Member {} not found", id))
        })?;

    success(member)
}

/// POST /api/group/members - Add a member to the caller's group.
pub async fn create_member(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateMemberRequest>,
) -> ApiResult<Member> {
    let membership = require_admin(&state, &principal).await?;

    let fields = validate_member_fields(
        &request.first_name,
        &request.last_name,
        &request.phone,
        &request.email,
        &request.amount,
    )?;

    let member = state
        .repo
        .create_member(
            &membership.group_id,
            &fields.first_name,
            &fields.last_name,
            &fields.email,
            &fields.phone,
            fields.amount,
        )
        .await?;

    success(member)
}

/// PUT /api/group/members/{id} - Update a member.
pub async fn update_member(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMemberRequest>,
) -> ApiResult<Member> {
    let membership = require_admin(&state, &principal).await?;

    let fields = validate_member_fields(
        &request.first_name,
        &request.last_name,
        &request.phone,
        &request.email,
        &request.amount,
    )?;

    let member = state
        .repo
        .update_member(
            &membership.group_id,
            &id,
            &fields.first_name,
            &fields.last_name,
            &fields.email,
            &fields.phone,
            fields.amount,
        )
        .await?;

    success(member)
}

/// DELETE /api/group/members/{id} - Delete a member.
///
/// Ledger entries are kept; they stay attributed by denormalized name.
pub async fn delete_member(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let membership = require_admin(&state, &principal).await?;
    state.repo.delete_member(&membership.group_id, &id).await?;
    success(())
}

/// GET /api/group/members/by-phone/{phone} - Look up a member by phone.
pub async fn find_member_by_phone(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<Member> {
    let membership = require_admin(&state, &principal).await?;
    let member = state
        .repo
        .find_member_by_phone(&membership.group_id, &phone)
        .await?;
    success(member)
}
