// ============================
// crates/backend-lib/src/middleware/session_gate.rs
// ============================
//! Authorization gate for the protected pages.
//!
//! Every failure (no token, bad signature, expired, unknown session) ends in
//! the same `303 See Other` to `/login`.
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use metrics::counter;

use crate::metrics::GATE_REJECTED;
use crate::storage::Account;
use crate::web::cookies::request_cookies;
use crate::AppState;

/// Name of the session cookie
pub const TOKEN_COOKIE: &str = "token";

/// The authenticated caller, inserted by [`session_gate`]
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: String,
    pub account: Account,
}

/// Session token from the `token` cookie, else from a bearer header
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = request_cookies(headers)
        .into_iter()
        .find(|(name, _)| name == TOKEN_COOKIE)
        .map(|(_, value)| value);
    if let Some(token) = from_cookie.filter(|t| !t.is_empty()) {
        return Some(token);
    }

    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn reject(reason: &'static str) -> Response {
    counter!(GATE_REJECTED, "reason" => reason).increment(1);
    tracing::debug!(reason, "request rejected by session gate");
    Redirect::to("/login").into_response()
}

/// Middleware admitting only requests that carry a live session
pub async fn session_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()) else {
        return reject("missing_token");
    };
    let Some(account) = state.auth.authenticate(&token) else {
        return reject("invalid_session");
    };

    request
        .extensions_mut()
        .insert(CurrentSession { token, account });
    next.run(request).await
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| Redirect::to("/login"))
    }
}
