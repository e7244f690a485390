// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod password;
pub mod rate_limit;
pub mod session;
pub mod token;
pub mod token_generator;
mod service;
mod service_impl;

pub use password::{hash_password, verify_password, HashCost};
pub use rate_limit::AuthRateLimiter;
pub use service::{AuthService, LoginGrant};
pub use service_impl::{AuthPolicy, DefaultAuth};
pub use session::{Session, SessionStore};
pub use token::{Claims, IssuedToken, SigningSecret, TokenError, TokenIssuer};
