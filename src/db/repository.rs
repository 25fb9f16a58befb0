//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. The balance
//! update and the group setup sequence are each a single transaction, so a
//! failure mid-sequence never leaves a half-applied state.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::errors::{codes, AppError};
use crate::models::{
    format_display_date, per_head_expense, Account, Activity, DuplicateCheck, EntryType, Group,
    LedgerEntry, Member, Membership, Role,
};
use crate::validation::{normalize_email, normalize_name, normalize_phone};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== ACCOUNT OPERATIONS ====================

    /// Create a login account. The email must already be normalized.
    pub async fn create_account(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Account, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO accounts (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(email)
        .bind(password_hash)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict(codes::EMAIL_IN_USE, "Email already registered")
            } else {
                e.into()
            }
        })?;

        Ok(Account {
            id,
            email: email.to_string(),
            created_at: now,
        })
    }

    /// Look up an account and its password hash by normalized email.
    pub async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(Account, String)>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            (
                Account {
                    id: row.get("id"),
                    email: row.get("email"),
                    created_at: row.get("created_at"),
                },
                row.get("password_hash"),
            )
        }))
    }

    /// Compensating cleanup after a failed signup: removes the account, its
    /// sessions and reset tokens, and any profile that never joined a group.
    pub async fn delete_account(&self, account_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM password_resets WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM members WHERE account_id = ? AND group_id IS NULL")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn update_password(
        &self,
        account_id: &str,
        password_hash: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== SESSION OPERATIONS ====================

    pub async fn create_session(&self, account_id: &str) -> Result<String, AppError> {
        let token = crate::auth::new_token();
        let now = Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO sessions (token, account_id, created_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(account_id)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        Ok(token)
    }

    pub async fn find_session(&self, token: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT account_id FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("account_id")))
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_sessions_for_account(&self, account_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Issue (or replace) a password-reset token for an account.
    pub async fn create_password_reset(&self, account_id: &str) -> Result<String, AppError> {
        let token = crate::auth::new_token();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT OR REPLACE INTO password_resets (account_id, token, created_at) VALUES (?, ?, ?)",
        )
        .bind(account_id)
        .bind(&token)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    pub async fn find_password_reset(&self, account_id: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT token FROM password_resets WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("token")))
    }

    pub async fn consume_password_reset(&self, account_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM password_resets WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== CODE OPERATIONS ====================

    /// Resolve the group an admin code maps to.
    pub async fn resolve_group_for_admin_code(&self, admin_code: &str) -> Result<String, AppError> {
        let row = sqlx::query("SELECT group_code FROM admin_codes WHERE admin_code = ?")
            .bind(admin_code)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.get("group_code"))
            .ok_or_else(|| AppError::missing(codes::INVALID_ADMIN_CODE, "Invalid Admin Code"))
    }

    /// A group code is valid for signup when it is a registered mapping value
    /// AND its group record exists.
    pub async fn resolve_group_for_signup_code(&self, group_code: &str) -> Result<String, AppError> {
        let row = sqlx::query(
            r#"SELECT g.group_code FROM groups g
               JOIN admin_codes a ON a.group_code = g.group_code
               WHERE g.group_code = ?"#,
        )
        .bind(group_code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.get("group_code")).ok_or_else(|| {
            AppError::missing(
                codes::INVALID_GROUP_CODE,
                "Invalid group code - please check with your administrator",
            )
        })
    }

    /// Initial group setup: one batched write that creates the group,
    /// registers the admin-code mapping, and migrates the caller's unscoped
    /// profile into the group with role Admin.
    pub async fn setup_group(
        &self,
        account_id: &str,
        group_code: &str,
        admin_code: &str,
    ) -> Result<Group, AppError> {
        let mut tx = self.pool.begin().await?;

        let profile = sqlx::query("SELECT id FROM members WHERE account_id = ? AND group_id IS NULL")
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?;
        let profile_id: String = profile
            .map(|r| r.get("id"))
            .ok_or_else(|| AppError::not_found("No pending profile found for this account"))?;

        let admin_taken = sqlx::query("SELECT 1 FROM admin_codes WHERE admin_code = ?")
            .bind(admin_code)
            .fetch_optional(&mut *tx)
            .await?;
        if admin_taken.is_some() {
            return Err(AppError::conflict(
                codes::DUPLICATE_ADMIN_CODE,
                "This admin code is already in use. Please choose a different one.",
            ));
        }

        let group_mapped = sqlx::query("SELECT 1 FROM admin_codes WHERE group_code = ?")
            .bind(group_code)
            .fetch_optional(&mut *tx)
            .await?;
        if group_mapped.is_some() {
            return Err(AppError::conflict(
                codes::DUPLICATE_GROUP_CODE,
                "This group code is already in use by another admin. Please choose a different one.",
            ));
        }

        let group_exists = sqlx::query("SELECT 1 FROM groups WHERE group_code = ?")
            .bind(group_code)
            .fetch_optional(&mut *tx)
            .await?;
        if group_exists.is_some() {
            return Err(AppError::conflict(
                codes::DUPLICATE_GROUP_CODE,
                "This group code is already in use. Please choose a different one.",
            ));
        }

        let now = Utc::now().to_rfc3339();

        let result: Result<(), sqlx::Error> = async {
            sqlx::query("INSERT INTO groups (group_code, created_at, member_count) VALUES (?, ?, 1)")
                .bind(group_code)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO admin_codes (admin_code, group_code) VALUES (?, ?)")
                .bind(admin_code)
                .bind(group_code)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE members SET group_id = ?, role = 'Admin' WHERE id = ?")
                .bind(group_code)
                .bind(&profile_id)
                .execute(&mut *tx)
                .await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            // A concurrent setup won the race on one of the code columns.
            if is_unique_violation(&e) {
                return Err(AppError::conflict(
                    codes::DUPLICATE_GROUP_CODE,
                    "This group or admin code is already in use. Please choose a different one.",
                ));
            }
            return Err(e.into());
        }

        tx.commit().await?;

        Ok(Group {
            group_code: group_code.to_string(),
            created_at: now,
            member_count: 1,
        })
    }

    // ==================== MEMBER OPERATIONS ====================

    pub async fn get_group(&self, group_code: &str) -> Result<Option<Group>, AppError> {
        let row = sqlx::query(
            "SELECT group_code, created_at, member_count FROM groups WHERE group_code = ?",
        )
        .bind(group_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(group_from_row))
    }

    /// Create the unscoped profile that the initial setup later migrates.
    pub async fn create_unscoped_profile(
        &self,
        account_id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
    ) -> Result<Member, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO members (id, account_id, group_id, first_name, last_name, email, phone, role, amount, created_at)
               VALUES (?, ?, NULL, ?, ?, ?, ?, 'Admin', '0', ?)"#,
        )
        .bind(&id)
        .bind(account_id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(phone)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Member {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            role: Role::Admin,
            amount: Decimal::ZERO,
            created_at: now,
        })
    }

    /// Resolve the acting account's group-scoped membership.
    pub async fn membership_for_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Membership>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, group_id, first_name, last_name, email, phone, role, amount, created_at
               FROM members WHERE account_id = ? AND group_id IS NOT NULL"#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Membership {
            group_id: row.get("group_id"),
            member: member_from_row(&row),
        }))
    }

    /// List all members of a group.
    pub async fn list_members(&self, group_id: &str) -> Result<Vec<Member>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, first_name, last_name, email, phone, role, amount, created_at
               FROM members WHERE group_id = ? ORDER BY first_name"#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(member_from_row).collect())
    }

    /// Get a member by ID within a group.
    pub async fn get_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<Option<Member>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, first_name, last_name, email, phone, role, amount, created_at
               FROM members WHERE group_id = ? AND id = ?"#,
        )
        .bind(group_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(member_from_row))
    }

    /// Scan the group's members for identity collisions. Inputs and stored
    /// values are compared in normalized form; `excluding` skips the member
    /// being updated. O(members) per call, fine at club-size cardinality.
    pub async fn check_duplicate(
        &self,
        group_id: &str,
        first_name: &str,
        phone: &str,
        email: &str,
        excluding: Option<&str>,
    ) -> Result<DuplicateCheck, AppError> {
        let rows = sqlx::query("SELECT id, first_name, phone, email FROM members WHERE group_id = ?")
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;

        let name_norm = normalize_name(first_name);
        let phone_norm = normalize_phone(phone);
        let email_norm = normalize_email(email);

        let mut check = DuplicateCheck::default();
        for row in &rows {
            let id: String = row.get("id");
            if excluding == Some(id.as_str()) {
                continue;
            }
            let other_name: String = row.get("first_name");
            let other_phone: String = row.get("phone");
            let other_email: String = row.get("email");

            if normalize_name(&other_name) == name_norm {
                check.name = true;
            }
            if normalize_phone(&other_phone) == phone_norm {
                check.phone = true;
            }
            if normalize_email(&other_email) == email_norm {
                check.email = true;
            }
        }

        Ok(check)
    }

    /// Add a member without a login (admin "Add" screen). Fields must already
    /// be normalized and format-checked by the caller.
    pub async fn create_member(
        &self,
        group_id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
        amount: Decimal,
    ) -> Result<Member, AppError> {
        self.insert_member(group_id, None, first_name, last_name, email, phone, Role::User, amount)
            .await
    }

    /// Add a member bound to a login account (self-service signup).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_member_for_account(
        &self,
        group_id: &str,
        account_id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
        role: Role,
    ) -> Result<Member, AppError> {
        self.insert_member(
            group_id,
            Some(account_id),
            first_name,
            last_name,
            email,
            phone,
            role,
            Decimal::ZERO,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_member(
        &self,
        group_id: &str,
        account_id: Option<&str>,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
        role: Role,
        amount: Decimal,
    ) -> Result<Member, AppError> {
        let dup = self
            .check_duplicate(group_id, first_name, phone, email, None)
            .await?;
        if let Some(err) = duplicate_error(&dup) {
            return Err(err);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO members (id, account_id, group_id, first_name, last_name, email, phone, role, amount, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(account_id)
        .bind(group_id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(phone)
        .bind(role.as_str())
        .bind(amount.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(member_conflict_from)?;

        sqlx::query("UPDATE groups SET member_count = member_count + 1 WHERE group_code = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Member {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            role,
            amount,
            created_at: now,
        })
    }

    /// Update a member's details. Name uniqueness is always re-checked;
    /// phone/email uniqueness only when they changed relative to the stored
    /// values.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_member(
        &self,
        group_id: &str,
        member_id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
        amount: Decimal,
    ) -> Result<Member, AppError> {
        let existing = self
            .get_member(group_id, member_id)
            .await?
            .ok_or_else(|| member_not_found(member_id))?;

        let phone_changed = normalize_phone(phone) != existing.phone;
        let email_changed = normalize_email(email) != existing.email;

        let dup = self
            .check_duplicate(group_id, first_name, phone, email, Some(member_id))
            .await?;
        if dup.name {
            return Err(AppError::conflict(
                codes::DUPLICATE_NAME,
                "A member with this first name already exists in your group",
            ));
        }
        if phone_changed && dup.phone {
            return Err(AppError::conflict(
                codes::DUPLICATE_PHONE,
                "Phone number already exists for another member in your group",
            ));
        }
        if email_changed && dup.email {
            return Err(AppError::conflict(
                codes::DUPLICATE_EMAIL,
                "Email already exists for another member in your group",
            ));
        }

        sqlx::query(
            r#"UPDATE members SET first_name = ?, last_name = ?, email = ?, phone = ?, amount = ?
               WHERE group_id = ? AND id = ?"#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(phone)
        .bind(amount.to_string())
        .bind(group_id)
        .bind(member_id)
        .execute(&self.pool)
        .await
        .map_err(member_conflict_from)?;

        Ok(Member {
            id: member_id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            role: existing.role,
            amount,
            created_at: existing.created_at,
        })
    }

    /// Delete a member. Ledger entries are retained, orphaned by display
    /// name only.
    pub async fn delete_member(&self, group_id: &str, member_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM members WHERE group_id = ? AND id = ?")
            .bind(group_id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(member_not_found(member_id));
        }

        sqlx::query("UPDATE groups SET member_count = member_count - 1 WHERE group_code = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Look up a member by normalized phone number.
    pub async fn find_member_by_phone(
        &self,
        group_id: &str,
        phone: &str,
    ) -> Result<Member, AppError> {
        let row = sqlx::query(
            r#"SELECT id, first_name, last_name, email, phone, role, amount, created_at
               FROM members WHERE group_id = ? AND phone = ?"#,
        )
        .bind(group_id)
        .bind(normalize_phone(phone))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(member_from_row).ok_or_else(|| {
            AppError::missing(
                codes::MEMBER_NOT_FOUND,
                "No member found with that phone number",
            )
        })
    }

    // ==================== LEDGER OPERATIONS ====================

    /// Apply a signed balance adjustment and append the audit entry, as one
    /// transaction. The entry type is derived from the sign of the delta.
    pub async fn apply_transaction(
        &self,
        group_id: &str,
        member_id: &str,
        delta: Decimal,
        reason: &str,
    ) -> Result<LedgerEntry, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT first_name, amount FROM members WHERE group_id = ? AND id = ?",
        )
        .bind(group_id)
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(member_not_found(member_id));
        };

        let member_name: String = row.get("first_name");
        let current: String = row.get("amount");
        let current = parse_amount(&current);
        let new_balance = current + delta;

        let entry_type = if delta.is_sign_negative() {
            EntryType::Debit
        } else {
            EntryType::Credit
        };

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let result: Result<(), sqlx::Error> = async {
            sqlx::query("UPDATE members SET amount = ? WHERE group_id = ? AND id = ?")
                .bind(new_balance.to_string())
                .bind(group_id)
                .bind(member_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"INSERT INTO ledger_entries (id, group_id, member_id, member_name, amount, new_balance, event, entry_type, date)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(group_id)
            .bind(member_id)
            .bind(&member_name)
            .bind(delta.to_string())
            .bind(new_balance.to_string())
            .bind(reason)
            .bind(entry_type.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            Ok(())
        }
        .await;

        if let Err(e) = result {
            tracing::error!("Balance update failed: {:?}", e);
            return Err(AppError::TransactionFailed(
                "Failed to submit data. Please try again.".to_string(),
            ));
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Balance update commit failed: {:?}", e);
            AppError::TransactionFailed("Failed to submit data. Please try again.".to_string())
        })?;

        Ok(LedgerEntry {
            id,
            member_id: member_id.to_string(),
            member_name,
            amount: delta,
            new_balance,
            event: reason.to_string(),
            entry_type,
            date: now.clone(),
            date_display: format_display_date(&now),
        })
    }

    /// All of a group's ledger entries, most recent first.
    pub async fn list_ledger(&self, group_id: &str) -> Result<Vec<LedgerEntry>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, member_id, member_name, amount, new_balance, event, entry_type, date
               FROM ledger_entries WHERE group_id = ? ORDER BY date DESC"#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(ledger_entry_from_row).collect())
    }

    /// One member's ledger entries, most recent first.
    pub async fn list_ledger_for_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, member_id, member_name, amount, new_balance, event, entry_type, date
               FROM ledger_entries WHERE group_id = ? AND member_id = ? ORDER BY date DESC"#,
        )
        .bind(group_id)
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(ledger_entry_from_row).collect())
    }

    // ==================== ACTIVITY OPERATIONS ====================

    /// Record an activity with its equal split. Attendee ids are resolved to
    /// display names at write time; the activity does not touch balances.
    pub async fn record_activity(
        &self,
        group_id: &str,
        activity_name: &str,
        activity_date: &str,
        total_expense: Decimal,
        attendee_ids: &[String],
    ) -> Result<Activity, AppError> {
        let mut members_checked = Vec::with_capacity(attendee_ids.len());
        for attendee_id in attendee_ids {
            let member = self
                .get_member(group_id, attendee_id)
                .await?
                .ok_or_else(|| member_not_found(attendee_id))?;
            members_checked.push(member.first_name);
        }

        let expense_per_head = per_head_expense(total_expense, attendee_ids.len());

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let checked_json = serde_json::to_string(&members_checked).unwrap_or_default();

        sqlx::query(
            r#"INSERT INTO activities (id, group_id, activity_name, activity_date, total_expense, expense_per_head, members_checked, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(group_id)
        .bind(activity_name)
        .bind(activity_date)
        .bind(total_expense.to_string())
        .bind(expense_per_head.to_string())
        .bind(&checked_json)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Activity {
            id,
            activity_name: activity_name.to_string(),
            activity_date: activity_date.to_string(),
            total_expense,
            expense_per_head,
            members_checked,
            created_at: now,
        })
    }

    /// All of a group's activities, most recent first.
    pub async fn list_activities(&self, group_id: &str) -> Result<Vec<Activity>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, activity_name, activity_date, total_expense, expense_per_head, members_checked, created_at
               FROM activities WHERE group_id = ? ORDER BY activity_date DESC, created_at DESC"#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(activity_from_row).collect())
    }

    /// Delete the oldest activity with an exact name match within the group.
    pub async fn remove_activity(
        &self,
        group_id: &str,
        activity_name: &str,
    ) -> Result<Activity, AppError> {
        let row = sqlx::query(
            r#"SELECT id, activity_name, activity_date, total_expense, expense_per_head, members_checked, created_at
               FROM activities WHERE group_id = ? AND activity_name = ?
               ORDER BY created_at ASC LIMIT 1"#,
        )
        .bind(group_id)
        .bind(activity_name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(AppError::not_found(format!(
                "No activity named '{}' found",
                activity_name
            )));
        };
        let activity = activity_from_row(&row);

        sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(&activity.id)
            .execute(&self.pool)
            .await?;

        Ok(activity)
    }
}

// Helper functions for row conversion

fn member_not_found(member_id: &str) -> AppError {
    AppError::missing(
        codes::MEMBER_NOT_FOUND,
        format!("Member {} not found", member_id),
    )
}

fn duplicate_error(check: &DuplicateCheck) -> Option<AppError> {
    if check.name {
        return Some(AppError::conflict(
            codes::DUPLICATE_NAME,
            "A member with this first name already exists in your group",
        ));
    }
    if check.phone {
        return Some(AppError::conflict(
            codes::DUPLICATE_PHONE,
            "Phone number already exists for another member in your group",
        ));
    }
    if check.email {
        return Some(AppError::conflict(
            codes::DUPLICATE_EMAIL,
            "Email already exists for another member in your group",
        ));
    }
    None
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Map a unique-index violation on the members table to the matching
/// duplicate error; the pre-write scan usually catches these first, so this
/// only fires when a concurrent write wins the race.
fn member_conflict_from(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let message = db.message().to_string();
            return if message.contains("phone") {
                AppError::conflict(
                    codes::DUPLICATE_PHONE,
                    "Phone number already exists for another member in your group",
                )
            } else if message.contains("email") {
                AppError::conflict(
                    codes::DUPLICATE_EMAIL,
                    "Email already exists for another member in your group",
                )
            } else {
                AppError::conflict(
                    codes::DUPLICATE_NAME,
                    "A member with this first name already exists in your group",
                )
            };
        }
    }
    err.into()
}

fn parse_amount(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn group_from_row(row: &sqlx::sqlite::SqliteRow) -> Group {
    Group {
        group_code: row.get("group_code"),
        created_at: row.get("created_at"),
        member_count: row.get("member_count"),
    }
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Member {
    let role: String = row.get("role");
    let amount: String = row.get("amount");
    Member {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        role: Role::from_str(&role).unwrap_or(Role::User),
        amount: parse_amount(&amount),
        created_at: row.get("created_at"),
    }
}

fn ledger_entry_from_row(row: &sqlx::sqlite::SqliteRow) -> LedgerEntry {
    let amount: String = row.get("amount");
    let new_balance: String = row.get("new_balance");
    let entry_type: String = row.get("entry_type");
    let date: String = row.get("date");
    LedgerEntry {
        id: row.get("id"),
        member_id: row.get("member_id"),
        member_name: row.get("member_name"),
        amount: parse_amount(&amount),
        new_balance: parse_amount(&new_balance),
        event: row.get("event"),
        entry_type: EntryType::from_str(&entry_type).unwrap_or(EntryType::Credit),
        date_display: format_display_date(&date),
        date,
    }
}

fn activity_from_row(row: &sqlx::sqlite::SqliteRow) -> Activity {
    let total_expense: String = row.get("total_expense");
    let expense_per_head: String = row.get("expense_per_head");
    let members_checked: String = row.get("members_checked");
    Activity {
        id: row.get("id"),
        activity_name: row.get("activity_name"),
        activity_date: row.get("activity_date"),
        total_expense: parse_amount(&total_expense),
        expense_per_head: parse_amount(&expense_per_head),
        members_checked: parse_json_array(&members_checked),
        created_at: row.get("created_at"),
    }
}
