// ============================
// crates/backend-lib/src/web/router.rs
// ============================
//! HTTP router.
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::middleware::session_gate;
use crate::AppState;

/// Create the HTTP router; everything except the login, signup and health
/// routes sits behind the session gate
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(handlers::home))
        .route("/users", get(handlers::list_users))
        .route("/update", get(handlers::update_page).post(handlers::update))
        .route("/delete", get(handlers::delete_page).post(handlers::delete))
        .route("/logout", get(handlers::logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_gate));

    Router::new()
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/signup", get(handlers::signup_page).post(handlers::signup))
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
