//! Input validation helpers
//!
//! Centralized text length constants and validation functions.

use thiserror::Error;

// ── Text length limits ──────────────────────────────────────────────

/// User names, dish names
pub const MAX_NAME_LEN: usize = 200;

/// Opaque ids: restaurant, dish, cart, item
pub const MAX_ID_LEN: usize = 128;

/// Phone numbers
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

/// Passwords (before hashing)
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// A rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FieldError(pub String);

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(FieldError(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), FieldError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(FieldError(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), FieldError> {
    validate_required_text(email, "email", MAX_EMAIL_LEN)?;
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(FieldError("email is not a valid address".to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), FieldError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(FieldError(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(FieldError(format!(
            "password is too long (max {MAX_PASSWORD_LEN})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text() {
        assert!(validate_required_text("Pizza", "name", MAX_NAME_LEN).is_ok());
        assert!(validate_required_text("   ", "name", MAX_NAME_LEN).is_err());
        let long = "x".repeat(MAX_NAME_LEN + 1);
        let err = validate_required_text(&long, "name", MAX_NAME_LEN).unwrap_err();
        assert!(err.0.contains("too long"));
        assert!(validate_optional_text(&None, "phone", MAX_SHORT_TEXT_LEN).is_ok());
    }

    #[test]
    fn emails() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email(" a@b.co ").is_ok());
        for bad in ["", "a", "a@b", "@b.co", "a@@b.co", "a@.co", "a b@c.co"] {
            assert!(validate_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn passwords() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(MAX_PASSWORD_LEN + 1)).is_err());
    }
}
