//! Activity records and the equal-split computation.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A recorded group activity with its equal per-head split.
///
/// `members_checked` holds the attendee display names captured at submission
/// time. The activity itself does not touch any balances; the admin applies
/// those separately through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub activity_name: String,
    pub activity_date: String,
    pub total_expense: Decimal,
    pub expense_per_head: Decimal,
    pub members_checked: Vec<String>,
    pub created_at: String,
}

/// Request body for recording an activity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordActivityRequest {
    pub activity_name: String,
    pub activity_date: String,
    pub total_expense: String,
    pub attendee_ids: Vec<String>,
}

/// Equal split of a total across `count` heads, rounded to 2 decimal places
/// (half-up). Computed once at submission time and persisted as-is.
pub fn per_head_expense(total: Decimal, count: usize) -> Decimal {
    (total / Decimal::from(count as u64))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
