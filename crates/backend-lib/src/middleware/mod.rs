// crates/backend-lib/src/middleware/mod.rs

//! Request middleware and extractors.

pub mod client_ip;
pub mod session_gate;

pub use client_ip::ClientIp;
pub use session_gate::{session_gate, session_token, CurrentSession, TOKEN_COOKIE};
