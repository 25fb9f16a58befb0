//! Ledger entry model and balance update requests.

use chrono::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Credit => "credit",
            EntryType::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(EntryType::Credit),
            "debit" => Some(EntryType::Debit),
            _ => None,
        }
    }
}

/// An immutable audit record appended with every balance adjustment.
///
/// `member_name` is denormalized at write time; renaming a member does not
/// rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub member_id: String,
    pub member_name: String,
    /// Signed delta: positive for credit, negative for debit.
    pub amount: Decimal,
    /// Balance on the member record right after this entry was applied.
    pub new_balance: Decimal,
    /// Free-text reason / event label.
    pub event: String,
    pub entry_type: EntryType,
    pub date: String,
    /// Display form of `date`, derived at read time.
    pub date_display: String,
}

/// Request body for a balance update.
///
/// The form collects an unsigned magnitude plus a direction; the handler
/// converts them into a signed delta.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdateRequest {
    pub member_id: String,
    pub amount: String,
    pub action: EntryType,
    #[serde(default)]
    pub reason: String,
}

/// A member's own balance view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub member_id: String,
    pub first_name: String,
    pub last_name: String,
    pub amount: Decimal,
}

/// Format a stored RFC 3339 date for display. Pure function of the stored
/// value; unparseable input renders as "N/A".
pub fn format_display_date(rfc3339: &str) -> String {
    match DateTime::parse_from_rfc3339(rfc3339) {
        Ok(dt) => dt.format("%m/%d/%Y").to_string(),
        Err(_) => "N/A".to_string(),
    }
}
