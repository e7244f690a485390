// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_REMOVED: &str = "session.removed";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const LOGIN_SUCCESS: &str = "auth.login.success";
pub const LOGIN_FAILURE: &str = "auth.login.failure";
pub const SIGNUP: &str = "auth.signup";
pub const ACCOUNT_DELETED: &str = "auth.delete";
pub const GATE_REJECTED: &str = "auth.gate.rejected";
pub const ACCESS_CHECK: &str = "access.check";
