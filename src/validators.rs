/// Input validators
///
/// Every request body passes through one of the `validate_*` functions
/// before reaching the auth service. Each returns the normalized values or
/// the complete list of field problems found.

use regex::Regex;
use lazy_static::lazy_static;

use crate::error::ValidationErrors;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_LOCAL_PART_LENGTH: usize = 64;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 72; // bcrypt ignores anything beyond 72 bytes
const MAX_REFRESH_TOKEN_LENGTH: usize = 512;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Validated login input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Validated registration input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInput {
    pub email: String,
    pub password: String,
}

/// Validated refresh input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshInput {
    pub email: String,
    pub refresh_token: String,
}

/// Login only checks shape; the password policy is not revealed here.
pub fn validate_login(email: &str, password: &str) -> Result<LoginInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = check_email(email, &mut errors);

    if password.is_empty() {
        errors.push("password", "is empty");
    } else if password.len() > MAX_PASSWORD_LENGTH {
        errors.push(
            "password",
            format!("is too long (maximum {} characters)", MAX_PASSWORD_LENGTH),
        );
    }

    errors.into_result()?;
    Ok(LoginInput {
        email: email.unwrap_or_default(),
        password: password.to_string(),
    })
}

pub fn validate_registration(
    email: &str,
    password: &str,
) -> Result<RegistrationInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = check_email(email, &mut errors);
    check_password_policy(password, &mut errors);

    errors.into_result()?;
    Ok(RegistrationInput {
        email: email.unwrap_or_default(),
        password: password.to_string(),
    })
}

/// Token contents are not judged here: an unknown token is an auth
/// failure, not a malformed request.
pub fn validate_refresh(email: &str, refresh_token: &str) -> Result<RefreshInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = check_email(email, &mut errors);

    let token = refresh_token.trim();
    if token.is_empty() {
        errors.push("refreshToken", "is empty");
    } else if token.len() > MAX_REFRESH_TOKEN_LENGTH {
        errors.push(
            "refreshToken",
            format!("is too long (maximum {} characters)", MAX_REFRESH_TOKEN_LENGTH),
        );
    }

    errors.into_result()?;
    Ok(RefreshInput {
        email: email.unwrap_or_default(),
        refresh_token: token.to_string(),
    })
}

/// Trimmed, lower-cased email, or `None` with the problem recorded
fn check_email(email: &str, errors: &mut ValidationErrors) -> Option<String> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        errors.push("email", "is empty");
        return None;
    }
    if trimmed.len() < MIN_EMAIL_LENGTH {
        errors.push(
            "email",
            format!("is too short (minimum {} characters)", MIN_EMAIL_LENGTH),
        );
        return None;
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        errors.push(
            "email",
            format!("is too long (maximum {} characters)", MAX_EMAIL_LENGTH),
        );
        return None;
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        errors.push("email", "has invalid format");
        return None;
    }
    if has_suspicious_email_patterns(trimmed) {
        errors.push("email", "contains suspicious content");
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

/// Detects patterns in addresses that are technically valid but abusive
fn has_suspicious_email_patterns(email: &str) -> bool {
    let Some(at_pos) = email.find('@') else {
        return true;
    };
    let (local_part, domain) = (&email[..at_pos], &email[at_pos + 1..]);

    local_part.len() > MAX_LOCAL_PART_LENGTH
        || local_part.starts_with('.')
        || local_part.ends_with('.')
        || local_part.contains("..")
        || !domain.contains('.')
}

/// Requirements:
/// - 8 to 72 characters
/// - at least one letter and one digit
fn check_password_policy(password: &str, errors: &mut ValidationErrors) {
    if password.len() < MIN_PASSWORD_LENGTH {
        errors.push(
            "password",
            format!("is too short (minimum {} characters)", MIN_PASSWORD_LENGTH),
        );
        return;
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        errors.push(
            "password",
            format!("is too long (maximum {} characters)", MAX_PASSWORD_LENGTH),
        );
        return;
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    if !has_digit || !has_letter {
        errors.push("password", "must contain at least one letter and one digit");
    }
}
