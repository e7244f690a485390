// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Form validation module.

use authdb_common::{SignupForm, UpdateForm};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Common validation constants
pub const MIN_LOGIN_LENGTH: usize = 5;
const MAX_LOGIN_LENGTH: usize = 64;
pub const MIN_PASSWORD_LENGTH: usize = 4;
pub const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

// Regex patterns for validation
static NUMERIC_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Not all fields are filled in")]
    MissingFields,

    #[error("Password mismatch")]
    PasswordMismatch,

    #[error("{0}")]
    InvalidLogin(String),

    #[error("{0}")]
    InvalidEmail(String),

    #[error("{0}")]
    InvalidPassword(String),

    #[error("No valid update data provided")]
    NoUpdateData,
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Signup fields after trimming and validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub login: String,
    pub email: String,
    pub password: String,
}

/// A single profile change requested through the update form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountUpdate {
    Login(String),
    Email(String),
    Password(String),
}

/// Whether a string consists only of decimal digits
pub fn is_numeric(s: &str) -> bool {
    NUMERIC_REGEX.is_match(s)
}

/// Validate a login name
pub fn validate_login(login: &str) -> ValidationResult<&str> {
    if login.is_empty() {
        return Err(ValidationError::MissingFields);
    }

    if is_numeric(login) {
        return Err(ValidationError::InvalidLogin(
            "Login must not consist of digits only".to_string(),
        ));
    }

    let length = login.chars().count();
    if length < MIN_LOGIN_LENGTH {
        return Err(ValidationError::InvalidLogin(format!(
            "Minimum login length - {MIN_LOGIN_LENGTH} characters"
        )));
    }
    if length > MAX_LOGIN_LENGTH {
        return Err(ValidationError::InvalidLogin(format!(
            "Login cannot exceed {MAX_LOGIN_LENGTH} characters"
        )));
    }

    Ok(login)
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::MissingFields);
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email format".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a password: length bounds plus at least one letter and one digit
pub fn validate_password(password: &str) -> ValidationResult<&str> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Minimum password length - {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(ValidationError::InvalidPassword(
            "The password should not contain only numbers or letters".to_string(),
        ));
    }

    Ok(password)
}

/// Validate the signup form
pub fn validate_signup(form: &SignupForm) -> ValidationResult<ValidSignup> {
    let login = form.login.trim();
    let email = form.email.trim();
    let password = form.password.trim();
    let confirm = form.confirm_password.trim();

    if login.is_empty() || email.is_empty() || password.is_empty() || confirm.is_empty() {
        return Err(ValidationError::MissingFields);
    }

    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }

    validate_password(password)?;
    validate_login(login)?;
    validate_email(email)?;

    Ok(ValidSignup {
        login: login.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    })
}

/// Validate the update form; exactly one field must be populated
pub fn validate_update(form: &UpdateForm) -> ValidationResult<AccountUpdate> {
    let login = form.new_login.trim();
    let email = form.new_email.trim();
    let password = form.new_password.trim();

    match (login.is_empty(), email.is_empty(), password.is_empty()) {
        (false, true, true) => Ok(AccountUpdate::Login(validate_login(login)?.to_string())),
        (true, false, true) => Ok(AccountUpdate::Email(validate_email(email)?.to_string())),
        (true, true, false) => Ok(AccountUpdate::Password(
            validate_password(password)?.to_string(),
        )),
        _ => Err(ValidationError::NoUpdateData),
    }
}
