// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! In-memory session store.
//!
//! Maps an issued session token to the account snapshot taken at login.
//! One exclusive lock guards the whole map and every critical section is a
//! single map operation; nothing awaits while the lock is held.
use std::{collections::HashMap, sync::Arc};

use authdb_common::AccountId;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;

use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED, SESSION_REMOVED};
use crate::storage::Account;

/// Session information
#[derive(Debug, Clone)]
pub struct Session {
    pub account: Account,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Session store for authentication tokens.
///
/// Cloning is cheap and every clone shares the same map.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    /// Create an empty session store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the session for `token`
    pub fn put(&self, token: impl Into<String>, account: Account, expires_at: DateTime<Utc>) {
        let session = Session {
            account,
            created_at: Utc::now(),
            expires_at,
        };
        let active = {
            let mut sessions = self.sessions.lock();
            sessions.insert(token.into(), session);
            sessions.len()
        };

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(active as f64);
    }

    /// Get the account behind a token; expired entries count as missing
    pub fn get(&self, token: &str) -> Option<Account> {
        self.get_at(token, Utc::now())
    }

    fn get_at(&self, token: &str, now: DateTime<Utc>) -> Option<Account> {
        let mut sessions = self.sessions.lock();
        match sessions.get(token) {
            None => return None,
            Some(session) if !session.is_expired(now) => return Some(session.account.clone()),
            Some(_) => {},
        }
        sessions.remove(token);
        drop(sessions);

        counter!(SESSION_EXPIRED).increment(1);
        None
    }

    /// Remove a session. Removing an unknown token is a no-op.
    pub fn remove(&self, token: &str) {
        let removed = self.sessions.lock().remove(token).is_some();
        if removed {
            counter!(SESSION_REMOVED).increment(1);
        }
    }

    /// Drop every session that belongs to `account_id`
    pub fn remove_account(&self, account_id: AccountId) -> usize {
        let removed = {
            let mut sessions = self.sessions.lock();
            let before = sessions.len();
            sessions.retain(|_, session| session.account.id != account_id);
            before - sessions.len()
        };
        if removed > 0 {
            counter!(SESSION_REMOVED).increment(removed as u64);
        }
        removed
    }

    /// Replace the snapshot held by every session of this account
    pub fn refresh_account(&self, account: &Account) {
        let mut sessions = self.sessions.lock();
        for session in sessions.values_mut() {
            if session.account.id == account.id {
                session.account = account.clone();
            }
        }
    }

    /// Number of stored sessions, expired ones included
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
