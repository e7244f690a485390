// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core of the account session-authentication service.

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod middleware;
pub mod storage;
pub mod validation;
pub mod web;

use std::sync::Arc;

use crate::access::AccessService;
use crate::auth::{AuthPolicy, AuthRateLimiter, AuthService, DefaultAuth, SessionStore, TokenIssuer};
use crate::config::Settings;
use crate::events::{EventSink, TracingEventSink};
use crate::storage::{AccountStore, FlatFileStorage};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Live sessions
    pub sessions: SessionStore,
    /// Session token issuer
    pub tokens: Arc<TokenIssuer>,
    /// Account store
    pub accounts: Arc<dyn AccountStore>,
    pub settings: Arc<Settings>,
    /// Failed-login throttle
    pub login_limiter: Arc<AuthRateLimiter>,
}

impl AppState {
    /// Wire the services together. Fails when the signing secret is unusable.
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        settings: Settings,
        events: Arc<dyn EventSink>,
    ) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenIssuer::new(
            &settings.jwt_secret,
            settings.session_ttl(),
        )?);
        let sessions = SessionStore::new();
        let auth = Arc::new(DefaultAuth::new(
            Arc::clone(&accounts),
            sessions.clone(),
            Arc::clone(&tokens),
            events,
            AuthPolicy::from(&settings),
        ));
        let login_limiter = Arc::new(AuthRateLimiter::new(
            settings.login_throttle.max_attempts,
            settings.lockout_duration(),
        ));

        Ok(Self {
            auth,
            sessions,
            tokens,
            accounts,
            settings: Arc::new(settings),
            login_limiter,
        })
    }

    /// State backed by `accounts.json` under `data_dir`, logging events
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let accounts = Arc::new(FlatFileStorage::new(&settings.data_dir)?);
        Self::new(accounts, settings, Arc::new(TracingEventSink))
    }

    /// Access-check procedure sharing this state's issuer and store
    pub fn access_service(&self) -> AccessService {
        AccessService::new(
            Arc::clone(&self.tokens),
            Arc::clone(&self.accounts),
            self.settings.store_timeout(),
        )
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let settings = Settings {
        jwt_secret: auth::token::test_secret(),
        password_hash: auth::password::test_cost(),
        ..Settings::default()
    };
    AppState::new(
        Arc::new(FlatFileStorage::in_memory()),
        settings,
        Arc::new(TracingEventSink),
    )
    .expect("test state")
}
