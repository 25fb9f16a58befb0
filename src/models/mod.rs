//! Data models for the GroupDues backend.
//!
//! Wire structs match the frontend field names (camelCase) exactly.

mod account;
mod activity;
mod group;
mod ledger;
mod member;

pub use account::*;
pub use activity::*;
pub use group::*;
pub use ledger::*;
pub use member::*;
