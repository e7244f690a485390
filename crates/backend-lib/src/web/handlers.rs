// ============================
// crates/backend-lib/src/web/handlers.rs
// ============================
//! HTTP handlers for the account pages.
use std::sync::Arc;

use authdb_common::{AccountView, LoginForm, SignupForm, UpdateForm};
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde_json::json;

use super::{cookies, pages};
use crate::error::AppError;
use crate::middleware::{ClientIp, CurrentSession};
use crate::validation::validate_update;
use crate::AppState;

/// Redirect that also tells the browser to drop every cookie it sent
fn redirect_clearing_cookies(to: &str, headers: &HeaderMap, secure: bool) -> Response {
    let mut response = Redirect::to(to).into_response();
    for (name, _) in cookies::request_cookies(headers) {
        match cookies::expired_cookie(&name, secure) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            },
            Err(e) => tracing::debug!(cookie = %name, error = %e, "skipping unclearable cookie"),
        }
    }
    response
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn login_page() -> Html<String> {
    Html(pages::login(None))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Form(form): Form<LoginForm>,
) -> Response {
    if !state.login_limiter.check_rate_limit(ip) {
        let err = AppError::AuthRateLimited;
        let page = pages::login(Some(err.form_message().as_str()));
        return (err.status_code(), Html(page)).into_response();
    }

    match state
        .auth
        .login(&form.login, &form.password, form.remember_me())
        .await
    {
        Ok(grant) => {
            state.login_limiter.record_success(ip);
            let cookie = match cookies::session_cookie(
                &grant.token,
                grant.expires_at,
                grant.lifetime,
                state.settings.cookie_secure,
            ) {
                Ok(cookie) => cookie,
                Err(e) => return AppError::Internal(e.to_string()).into_response(),
            };
            ([(SET_COOKIE, cookie)], Redirect::to("/")).into_response()
        },
        Err(err) if err.is_user_facing() => {
            if matches!(err, AppError::NotFound(_) | AppError::InvalidPassword) {
                state.login_limiter.record_failed_attempt(ip);
            }
            (
                StatusCode::BAD_REQUEST,
                Html(pages::login(Some(err.form_message().as_str()))),
            )
                .into_response()
        },
        Err(err) => err.into_response(),
    }
}

pub async fn signup_page() -> Html<String> {
    Html(pages::signup(None))
}

pub async fn signup(State(state): State<Arc<AppState>>, Form(form): Form<SignupForm>) -> Response {
    match state.auth.signup(&form).await {
        Ok(_) => Redirect::to("/login").into_response(),
        Err(err) if err.is_user_facing() => (
            StatusCode::BAD_REQUEST,
            Html(pages::signup(Some(err.form_message().as_str()))),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn home(session: CurrentSession) -> Html<String> {
    Html(pages::home(&session.account))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _session: CurrentSession,
) -> Result<Json<Vec<AccountView>>, AppError> {
    let accounts = state.auth.list_accounts().await?;
    Ok(Json(accounts.iter().map(|a| a.view()).collect()))
}

pub async fn update_page(session: CurrentSession) -> Html<String> {
    Html(pages::update(&session.account, None))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    session: CurrentSession,
    Form(form): Form<UpdateForm>,
) -> Response {
    let result = match validate_update(&form) {
        Ok(update) => state.auth.update_account(&session.account, update).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) if err.is_user_facing() => (
            err.status_code(),
            Html(pages::update(&session.account, Some(err.form_message().as_str()))),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn delete_page(session: CurrentSession) -> Html<String> {
    Html(pages::delete(&session.account))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    session: CurrentSession,
    headers: HeaderMap,
) -> Response {
    match state.auth.delete_account(&session.account).await {
        Ok(()) => redirect_clearing_cookies("/login", &headers, state.settings.cookie_secure),
        Err(err) => err.into_response(),
    }
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: CurrentSession,
    headers: HeaderMap,
) -> Response {
    state.auth.logout(&session.token);
    tracing::info!(user_id = session.account.id, "user logged out");
    redirect_clearing_cookies("/login", &headers, state.settings.cookie_secure)
}
