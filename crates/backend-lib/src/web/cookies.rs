// ============================
// crates/backend-lib/src/web/cookies.rs
// ============================
//! Cookie parsing and `Set-Cookie` values.
use std::time::Duration;

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::{DateTime, Utc};

use crate::middleware::TOKEN_COOKIE;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const EPOCH: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Every `name=value` pair the client sent, values percent-decoded
pub fn request_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((name.to_string(), value))
        })
        .collect()
}

/// Session cookie carrying `token` until `expires_at`
pub fn session_cookie(
    token: &str,
    expires_at: DateTime<Utc>,
    lifetime: Duration,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{TOKEN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Expires={}; Max-Age={}",
        expires_at.format(HTTP_DATE),
        lifetime.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Cookie that makes the browser drop `name`
pub fn expired_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Expires={EPOCH}; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
