// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::auth::password::HashCost;
use crate::auth::rate_limit::{DEFAULT_LOCKOUT_DURATION, DEFAULT_MAX_ATTEMPTS};
use crate::auth::token::{SigningSecret, MIN_SECRET_BYTES};

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "authdb.toml";

/// Prefix of environment overrides, e.g. `AUTHDB_JWT_SECRET`
pub const ENV_PREFIX: &str = "AUTHDB_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP listener
    pub bind_addr: SocketAddr,
    /// Access-check listener
    pub rpc_bind_addr: SocketAddr,
    /// Directory holding `accounts.json`
    pub data_dir: PathBuf,
    /// Log level
    pub log_level: String,
    pub log_format: LogFormat,
    /// HMAC secret for session tokens
    pub jwt_secret: SigningSecret,
    /// Session lifetime in seconds
    pub session_ttl_secs: u64,
    /// Session lifetime with "remember me" ticked
    pub remember_me_ttl_secs: u64,
    /// Deadline for a single account store call
    pub store_timeout_ms: u64,
    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
    /// Take the client address from `x-real-ip` / `x-forwarded-for`.
    /// Only safe behind a reverse proxy that overwrites them.
    pub trust_proxy_headers: bool,
    pub password_hash: HashCost,
    pub login_throttle: LoginThrottleSettings,
}

/// Failed-login throttling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoginThrottleSettings {
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 4444)),
            rpc_bind_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            jwt_secret: SigningSecret::default(),
            session_ttl_secs: 60 * 60,                // 1 hour
            remember_me_ttl_secs: 60 * 60 * 24 * 15,  // 15 days
            store_timeout_ms: 2_000,
            cookie_secure: true,
            trust_proxy_headers: false,
            password_hash: HashCost::default(),
            login_throttle: LoginThrottleSettings::default(),
        }
    }
}

impl Default for LoginThrottleSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_secs: DEFAULT_LOCKOUT_DURATION.as_secs(),
        }
    }
}

impl Settings {
    /// Load from `authdb.toml` and `AUTHDB_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from an explicit file, then apply environment overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix<P: AsRef<Path>>(path: P, prefix: &str) -> Result<Self> {
        let settings: Settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(prefix).split("__"))
            .extract()?;
        Ok(settings)
    }

    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Reject settings the service must not start with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!("invalid log level: {}", self.log_level);
        }
        if self.session_ttl_secs == 0 || self.remember_me_ttl_secs == 0 {
            bail!("session lifetimes must be positive");
        }
        if self.store_timeout_ms == 0 {
            bail!("store timeout must be positive");
        }
        if self.jwt_secret.is_empty() {
            bail!("jwt_secret is not set (use {ENV_PREFIX}JWT_SECRET)");
        }
        if self.login_throttle.max_attempts == 0 {
            bail!("login_throttle.max_attempts must be positive");
        }
        if self.bind_addr == self.rpc_bind_addr {
            bail!("bind_addr and rpc_bind_addr must differ");
        }
        self.password_hash.validate()?;
        // same check the issuer applies at start-up
        if let Err(e) = crate::auth::TokenIssuer::new(&self.jwt_secret, self.session_ttl()) {
            bail!("{e} (minimum {MIN_SECRET_BYTES} bytes)");
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn remember_me_ttl(&self) -> Duration {
        Duration::from_secs(self.remember_me_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.login_throttle.lockout_secs)
    }
}

/// Builder used by tests and embedding applications
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.settings.bind_addr = addr;
        self
    }

    pub fn rpc_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.settings.rpc_bind_addr = addr;
        self
    }

    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.settings.data_dir = dir;
        self
    }

    pub fn log_level(mut self, level: String) -> Self {
        self.settings.log_level = level;
        self
    }

    pub fn session_ttl(mut self, secs: u64) -> Self {
        self.settings.session_ttl_secs = secs;
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.settings.jwt_secret = SigningSecret::new(secret);
        self
    }

    pub fn password_hash(mut self, cost: HashCost) -> Self {
        self.settings.password_hash = cost;
        self
    }

    pub fn store_timeout_ms(mut self, millis: u64) -> Self {
        self.settings.store_timeout_ms = millis;
        self
    }

    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.settings.trust_proxy_headers = trust;
        self
    }

    pub fn login_throttle(mut self, max_attempts: u32, lockout_secs: u64) -> Self {
        self.settings.login_throttle = LoginThrottleSettings {
            max_attempts,
            lockout_secs,
        };
        self
    }

    pub fn build(self) -> Result<Settings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
