// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Account store abstraction with a flat-file implementation.
use std::{
    collections::BTreeMap,
    fs,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use authdb_common::{AccountId, AccountView};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{fs as tokio_fs, sync::RwLock};

/// Role given to accounts created through signup
pub const DEFAULT_ROLE: &str = "user";

const ACCOUNTS_FILE: &str = "accounts.json";

/// Errors reported by an account store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,

    #[error("{0} already registered")]
    Conflict(&'static str),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A stored account row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub login: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Public view without credential material
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            login: self.login.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            created_at: self.created_at,
        }
    }
}

/// An account that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub login: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl NewAccount {
    pub fn new(
        login: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: &str,
    ) -> Self {
        Self {
            login: login.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: role.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A single mutable column of an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountField {
    Login(String),
    Email(String),
    PasswordHash(String),
}

/// Trait for account persistence backends.
///
/// Implementations must enforce login and email uniqueness atomically; the
/// service's own existence check is only a fast path.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_login(&self, login: &str) -> Result<Account, StoreError>;

    async fn find_by_id(&self, id: AccountId) -> Result<Account, StoreError>;

    async fn exists_by_login_or_email(&self, login: &str, email: &str)
        -> Result<bool, StoreError>;

    /// Store a new account and return it with its assigned id
    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Change one column and return the updated row
    async fn update_field(&self, id: AccountId, field: AccountField)
        -> Result<Account, StoreError>;

    async fn delete(&self, id: AccountId) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<Account>, StoreError>;
}

/// Run a store call, giving up after `deadline`
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| StoreError::Unavailable(format!("no answer within {deadline:?}")))?
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountTable {
    next_id: AccountId,
    accounts: BTreeMap<AccountId, Account>,
}

impl AccountTable {
    fn login_taken(&self, login: &str, except: Option<AccountId>) -> bool {
        self.accounts
            .values()
            .any(|a| Some(a.id) != except && a.login == login)
    }

    fn email_taken(&self, email: &str, except: Option<AccountId>) -> bool {
        self.accounts
            .values()
            .any(|a| Some(a.id) != except && a.email.eq_ignore_ascii_case(email))
    }
}

/// Flat-file implementation of the `AccountStore` trait.
///
/// The table lives in memory and is rewritten to `accounts.json` after
/// every mutation.
pub struct FlatFileStorage {
    path: Option<PathBuf>,
    table: RwLock<AccountTable>,
}

impl FlatFileStorage {
    /// Open (or create) the store under `root`
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let path = root.join(ACCOUNTS_FILE);

        let table = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            AccountTable::default()
        };

        tracing::info!(path = %path.display(), accounts = table.accounts.len(), "account store opened");
        Ok(Self {
            path: Some(path),
            table: RwLock::new(table),
        })
    }

    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: RwLock::new(AccountTable::default()),
        }
    }

    async fn persist(&self, table: &AccountTable) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(table)?;
        let tmp = path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FlatFileStorage {
    async fn find_by_login(&self, login: &str) -> Result<Account, StoreError> {
        let table = self.table.read().await;
        table
            .accounts
            .values()
            .find(|a| a.login == login)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        let table = self.table.read().await;
        table.accounts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn exists_by_login_or_email(
        &self,
        login: &str,
        email: &str,
    ) -> Result<bool, StoreError> {
        let table = self.table.read().await;
        Ok(table.login_taken(login, None) || table.email_taken(email, None))
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut table = self.table.write().await;
        if table.login_taken(&account.login, None) {
            return Err(StoreError::Conflict("login"));
        }
        if table.email_taken(&account.email, None) {
            return Err(StoreError::Conflict("email"));
        }

        table.next_id += 1;
        let stored = Account {
            id: table.next_id,
            login: account.login,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            created_at: account.created_at,
        };
        table.accounts.insert(stored.id, stored.clone());
        self.persist(&table).await?;
        Ok(stored)
    }

    async fn update_field(
        &self,
        id: AccountId,
        field: AccountField,
    ) -> Result<Account, StoreError> {
        let mut table = self.table.write().await;
        if !table.accounts.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        match &field {
            AccountField::Login(login) if table.login_taken(login, Some(id)) => {
                return Err(StoreError::Conflict("login"));
            },
            AccountField::Email(email) if table.email_taken(email, Some(id)) => {
                return Err(StoreError::Conflict("email"));
            },
            _ => {},
        }

        let account = table.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        match field {
            AccountField::Login(login) => account.login = login,
            AccountField::Email(email) => account.email = email,
            AccountField::PasswordHash(hash) => account.password_hash = hash,
        }
        let updated = account.clone();
        self.persist(&table).await?;
        Ok(updated)
    }

    async fn delete(&self, id: AccountId) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        if table.accounts.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.persist(&table).await
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let table = self.table.read().await;
        Ok(table.accounts.values().cloned().collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Store that never answers
    pub(crate) struct HungStore;

    #[async_trait]
    impl AccountStore for HungStore {
        async fn find_by_login(&self, _login: &str) -> Result<Account, StoreError> {
            std::future::pending().await
        }

        async fn find_by_id(&self, _id: AccountId) -> Result<Account, StoreError> {
            std::future::pending().await
        }

        async fn exists_by_login_or_email(
            &self,
            _login: &str,
            _email: &str,
        ) -> Result<bool, StoreError> {
            std::future::pending().await
        }

        async fn insert(&self, _account: NewAccount) -> Result<Account, StoreError> {
            std::future::pending().await
        }

        async fn update_field(
            &self,
            _id: AccountId,
            _field: AccountField,
        ) -> Result<Account, StoreError> {
            std::future::pending().await
        }

        async fn delete(&self, _id: AccountId) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn list(&self) -> Result<Vec<Account>, StoreError> {
            std::future::pending().await
        }
    }
}
