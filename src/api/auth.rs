//! Authentication and signup endpoints.
//!
//! Signup flows create the login account first and the member profile second;
//! if the profile write fails, a best-effort compensating delete removes the
//! just-created account so no orphaned login remains.

use axum::{extract::State, Extension, Json};

use super::{success, ApiResult};
use crate::auth::{self, Principal};
use crate::errors::{codes, AppError};
use crate::models::{
    Account, AdminSignupRequest, LoginRequest, LoginResponse, Member, MemberSignupRequest,
    PasswordResetConfirmRequest, PasswordResetRequest, RegisterRequest, Role,
};
use crate::validation::{is_valid_email, is_valid_phone, normalize_email, normalize_phone};
use crate::AppState;

/// Profile fields in normalized form, ready for storage.
struct ProfileFields {
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
}

/// Validate and normalize the common signup fields.
fn validate_profile(
    first_name: &str,
    last_name: &str,
    phone: &str,
    email: &str,
    password: &str,
) -> Result<ProfileFields, AppError> {
    if first_name.trim().is_empty()
        || last_name.trim().is_empty()
        || phone.trim().is_empty()
        || email.trim().is_empty()
        || password.is_empty()
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
    if password.len() < 6 {
        return Err(AppError::validation(
            "Password must be at least 6 characters",
        ));
    }

    Ok(ProfileFields {
        first_name: first_name.trim().to_string(),
        last_name: last_name.trim().to_string(),
        email: normalize_email(email),
        phone: normalize_phone(phone),
    })
}

/// POST /api/auth/register - Initial admin registration.
///
/// Creates the account plus an unscoped profile; group setup later migrates
/// the profile into its new group.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Account> {
    let fields = validate_profile(
        &request.first_name,
        &request.last_name,
        &request.phone,
        &request.email,
        &request.password,
    )?;

    let hash = auth::hash_password(&request.password)?;
    let account = state.repo.create_account(&fields.email, &hash).await?;

    let profile = state
        .repo
        .create_unscoped_profile(
            &account.id,
            &fields.first_name,
            &fields.last_name,
            &fields.email,
            &fields.phone,
        )
        .await;

    if let Err(e) = profile {
        compensate_account(&state, &account.id).await;
        return Err(e);
    }

    success(account)
}

/// POST /api/auth/signup/admin - Join an existing group as admin via its
/// admin code.
pub async fn signup_admin(
    State(state): State<AppState>,
    Json(request): Json<AdminSignupRequest>,
) -> ApiResult<Member> {
    let fields = validate_profile(
        &request.first_name,
        &request.last_name,
        &request.phone,
        &request.email,
        &request.password,
    )?;

    let group_id = state
        .repo
        .resolve_group_for_admin_code(request.admin_code.trim())
        .await?;

    signup_into_group(&state, &group_id, fields, &request.password, Role::Admin).await
}

/// POST /api/auth/signup/member - Join a group as a regular member via its
/// group code.
pub async fn signup_member(
    State(state): State<AppState>,
    Json(request): Json<MemberSignupRequest>,
) -> ApiResult<Member> {
    let fields = validate_profile(
        &request.first_name,
        &request.last_name,
        &request.phone,
        &request.email,
        &request.password,
    )?;

    let group_id = state
        .repo
        .resolve_group_for_signup_code(request.group_code.trim())
        .await?;

    signup_into_group(&state, &group_id, fields, &request.password, Role::User).await
}

/// Shared tail of both signup flows: duplicate scan, account creation,
/// member creation, compensation on failure.
async fn signup_into_group(
    state: &AppState,
    group_id: &str,
    fields: ProfileFields,
    password: &str,
    role: Role,
) -> ApiResult<Member> {
    let hash = auth::hash_password(password)?;
    let account = state.repo.create_account(&fields.email, &hash).await?;

    let member = state
        .repo
        .create_member_for_account(
            group_id,
            &account.id,
            &fields.first_name,
            &fields.last_name,
            &fields.email,
            &fields.phone,
            role,
        )
        .await;

    match member {
        Ok(member) => success(member),
        Err(e) => {
            compensate_account(state, &account.id).await;
            Err(e)
        }
    }
}

/// Best-effort removal of a just-created account after a failed signup.
async fn compensate_account(state: &AppState, account_id: &str) {
    if let Err(cleanup) = state.repo.delete_account(account_id).await {
        tracing::error!("Signup cleanup failed for {}: {}", account_id, cleanup);
    }
}

/// POST /api/auth/login - Exchange credentials for a bearer session token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let email = normalize_email(&request.email);

    let Some((account, hash)) = state.repo.find_account_by_email(&email).await? else {
        return Err(invalid_credentials());
    };
    if !auth::verify_password(&request.password, &hash)? {
        return Err(invalid_credentials());
    }

    let token = state.repo.create_session(&account.id).await?;
    let membership = state.repo.membership_for_account(&account.id).await?;

    let (role, group_code, member_id) = match membership {
        Some(m) => (
            Some(m.member.role),
            Some(m.group_id),
            Some(m.member.id),
        ),
        None => (None, None, None),
    };

    success(LoginResponse {
        token,
        account_id: account.id,
        email: account.email,
        role,
        group_code,
        member_id,
    })
}

fn invalid_credentials() -> AppError {
    AppError::InvalidCredentials("Incorrect email or password".to_string())
}

/// POST /api/auth/logout - Destroy the presented session.
pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<()> {
    state.repo.delete_session(&principal.token).await?;
    success(())
}

/// POST /api/auth/password-reset - Issue a reset token.
///
/// Responds identically whether or not the account exists.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> ApiResult<()> {
    let email = normalize_email(&request.email);

    if let Some((account, _)) = state.repo.find_account_by_email(&email).await? {
        let token = state.repo.create_password_reset(&account.id).await?;
        let body = format!("Use this code to reset your password: {}", token);
        if let Err(e) = state.notifier.send(&email, "Password reset", &body) {
            tracing::warn!("Password reset email failed for {}: {}", email, e);
        }
    }

    success(())
}

/// POST /api/auth/password-reset/confirm - Rotate the password given a valid
/// reset token. Burns the token and revokes open sessions.
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> ApiResult<()> {
    if request.new_password.len() < 6 {
        return Err(AppError::validation(
            "Password must be at least 6 characters",
        ));
    }

    let email = normalize_email(&request.email);
    let Some((account, _)) = state.repo.find_account_by_email(&email).await? else {
        return Err(invalid_reset());
    };
    let Some(stored) = state.repo.find_password_reset(&account.id).await? else {
        return Err(invalid_reset());
    };
    if !auth::tokens_match(&request.token, &stored) {
        return Err(invalid_reset());
    }

    let hash = auth::hash_password(&request.new_password)?;
    state.repo.update_password(&account.id, &hash).await?;
    state.repo.consume_password_reset(&account.id).await?;
    state.repo.delete_sessions_for_account(&account.id).await?;

    success(())
}

fn invalid_reset() -> AppError {
    AppError::InvalidCredentials("Invalid or expired reset token".to_string())
}
