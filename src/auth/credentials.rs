//! Format and strength checks for registration and login input.
//!
//! Rules are checked in a fixed order and the first failure is reported;
//! nothing here touches the database.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::AppError;

pub const MAX_NAME_CHARS: usize = 20;
pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_PASSWORD_CHARS: usize = 64;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("email regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("You must fill all the fields")]
    Empty,
    #[error("Only printable characters are allowed as an input")]
    NotPrintable,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Username must be at most 20 characters")]
    NameTooLong,
    #[error("Username cannot contain '@'")]
    NameHasAt,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Password must be at most 64 characters")]
    PasswordTooLong,
    #[error("Password must contain a number, an upper case and a lower case character")]
    WeakPassword,
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Printable in the display sense: visible glyphs plus the plain space.
pub fn is_printable(c: char) -> bool {
    c == ' ' || !(c.is_control() || c.is_whitespace())
}

pub fn all_printable(s: &str) -> bool {
    s.chars().all(is_printable)
}

pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
) -> Result<(), CredentialError> {
    if [name, email, password].iter().any(|f| f.trim().is_empty()) {
        return Err(CredentialError::Empty);
    }

    if ![name, email, password].iter().all(|f| all_printable(f)) {
        return Err(CredentialError::NotPrintable);
    }

    if !EMAIL_RE.is_match(email) {
        return Err(CredentialError::InvalidEmail);
    }

    if name.chars().count() > MAX_NAME_CHARS {
        return Err(CredentialError::NameTooLong);
    }

    // Logins holding an '@' are looked up by email only
    if name.contains('@') {
        return Err(CredentialError::NameHasAt);
    }

    let password_len = password.chars().count();
    if password_len < MIN_PASSWORD_CHARS {
        return Err(CredentialError::PasswordTooShort);
    }
    if password_len > MAX_PASSWORD_CHARS {
        return Err(CredentialError::PasswordTooLong);
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    if !(has_digit && has_upper && has_lower) {
        return Err(CredentialError::WeakPassword);
    }

    Ok(())
}

pub fn validate_login(name: &str, password: &str) -> Result<(), CredentialError> {
    if name.trim().is_empty() || password.trim().is_empty() {
        return Err(CredentialError::Empty);
    }
    Ok(())
}
