//! Member model and membership requests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Role of a member within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Admin" => Some(Role::Admin),
            "User" => Some(Role::User),
            _ => None,
        }
    }
}

/// A member of a group with a running balance.
///
/// Email and phone are stored normalized (lowercased/trimmed, digits only),
/// so the stored values are directly comparable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub amount: Decimal,
    pub created_at: String,
}

/// A member row resolved together with its group scope.
///
/// Used to map the acting principal's account onto a group; never serialized.
#[derive(Debug, Clone)]
pub struct Membership {
    pub group_id: String,
    pub member: Member,
}

/// Request body for adding a member to the caller's group.
///
/// `amount` arrives as the raw form string and is parsed by the handler so
/// a malformed value surfaces as `INVALID_AMOUNT` rather than a decode error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub amount: String,
}

/// Request body for updating an existing member. All fields are re-submitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub amount: String,
}

/// Which identity fields collide with another member of the same group.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateCheck {
    pub name: bool,
    pub phone: bool,
    pub email: bool,
}
