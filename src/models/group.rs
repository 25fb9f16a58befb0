//! Group and setup models.

use serde::{Deserialize, Serialize};

/// A group keyed by its group code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_code: String,
    pub created_at: String,
    pub member_count: i64,
}

/// Request body for the initial group setup.
///
/// Both codes are entered twice in the setup form; the confirmations are
/// checked before any lookup happens.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRequest {
    pub group_code: String,
    pub confirm_group_code: String,
    pub admin_code: String,
    pub confirm_admin_code: String,
}
