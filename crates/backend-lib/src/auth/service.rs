use std::time::Duration;

use async_trait::async_trait;
use authdb_common::SignupForm;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::storage::Account;
use crate::validation::AccountUpdate;

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginGrant {
    /// Signed session token, also the cookie value
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Lifetime the token was issued with
    pub lifetime: Duration,
    pub account: Account,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Validate the form and create an account with the default role
    async fn signup(&self, form: &SignupForm) -> Result<Account, AppError>;

    /// Check credentials and open a session
    async fn login(
        &self,
        login: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<LoginGrant, AppError>;

    /// Resolve a token to the account snapshot of its live session
    fn authenticate(&self, token: &str) -> Option<Account>;

    /// Close one session. Unknown tokens are ignored.
    fn logout(&self, token: &str);

    /// Apply a single profile change to `account`
    async fn update_account(
        &self,
        account: &Account,
        update: AccountUpdate,
    ) -> Result<Account, AppError>;

    /// Remove the account and every session it holds
    async fn delete_account(&self, account: &Account) -> Result<(), AppError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, AppError>;
}
