// ================
// common/src/lib.rs
// ================
//! Common types shared between the account service and its callers.
//! This module defines the access-check procedure messages, the HTML form
//! payloads, and the public view of an account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account identifier assigned by the account store
pub type AccountId = i64;

/// Fully-qualified name of the access-check procedure
pub const CHECK_ACCESS_PATH: &str = "/access.v1.AuthService/CheckAccess";

/// Request for the remote access check
/// # Fields
/// * `token` - Signed session token presented by the caller
/// * `required_role` - Role the caller must hold
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub token: String,
    pub required_role: String,
}

/// Outcome of the remote access check.
///
/// Denials are ordinary responses, never transport errors.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub has_access: bool,
    pub message: String,
}

impl AccessResponse {
    pub fn granted() -> Self {
        Self {
            has_access: true,
            message: "Access granted".to_string(),
        }
    }

    pub fn denied() -> Self {
        Self {
            has_access: false,
            message: "Access denied".to_string(),
        }
    }

    pub fn invalid_token() -> Self {
        Self {
            has_access: false,
            message: "Invalid token".to_string(),
        }
    }
}

/// Login form payload
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
    /// Checkbox value, `"on"` when ticked
    pub remember_me: Option<String>,
}

impl LoginForm {
    pub fn remember_me(&self) -> bool {
        self.remember_me.as_deref() == Some("on")
    }
}

/// Signup form payload
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SignupForm {
    pub login: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Profile update form payload.
/// Exactly one of the fields is expected to be populated.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct UpdateForm {
    pub new_login: String,
    pub new_email: String,
    pub new_password: String,
}

/// Account as exposed to HTTP clients (no credential material)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub id: AccountId,
    pub login: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
