//! Input normalization and format checks shared by signup and member management.
//!
//! Phone numbers are compared digits-only, emails and first names
//! case-insensitively after trimming. The normalized forms are also what gets
//! stored, so equality filters against the database stay consistent.

/// Strip everything except ASCII digits from a phone number.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A phone number is valid when it has exactly 10 digits after normalization.
pub fn is_valid_phone(raw: &str) -> bool {
    normalize_phone(raw).len() == 10
}

/// Trim and lowercase an email for storage and comparison.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Minimal email shape check: one `@`, non-empty local part, and a dot with
/// non-empty sides in the domain. No whitespace anywhere.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && match domain.rsplit_once('.') {
                    Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
                    None => false,
                }
        }
        _ => false,
    }
}

/// Trim and lowercase a first name for uniqueness comparison.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Group and admin codes are numeric strings of 4 to 7 digits.
pub fn is_valid_code(raw: &str) -> bool {
    let trimmed = raw.trim();
    (4..=7).contains(&trimmed.len()) && trimmed.chars().all(|c| c.is_ascii_digit())
}
