// ============================
// crates/backend-lib/src/access.rs
// ============================
//! Remote access check.
//!
//! Other services present a session token together with the role they
//! require; the answer is derived from the token's claims and the account
//! store, never from the session map. Denials are ordinary responses.
use std::sync::Arc;
use std::time::Duration;

use authdb_common::{AccessRequest, AccessResponse};
use axum::{extract::State, routing::post, Json, Router};
use metrics::counter;

use crate::auth::TokenIssuer;
use crate::metrics::ACCESS_CHECK;
use crate::storage::{with_deadline, AccountStore};

/// Stateless access-check procedure
#[derive(Clone)]
pub struct AccessService {
    tokens: Arc<TokenIssuer>,
    accounts: Arc<dyn AccountStore>,
    store_timeout: Duration,
}

impl AccessService {
    pub fn new(
        tokens: Arc<TokenIssuer>,
        accounts: Arc<dyn AccountStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            accounts,
            store_timeout,
        }
    }

    pub async fn check_access(&self, request: &AccessRequest) -> AccessResponse {
        let claims = match self.tokens.parse(&request.token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "access check with unusable token");
                counter!(ACCESS_CHECK, "outcome" => "invalid_token").increment(1);
                return AccessResponse::invalid_token();
            },
        };

        let account = match with_deadline(self.store_timeout, self.accounts.find_by_id(claims.sub))
            .await
        {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(user_id = claims.sub, error = %e, "access check lookup failed");
                counter!(ACCESS_CHECK, "outcome" => "invalid_token").increment(1);
                return AccessResponse::invalid_token();
            },
        };

        if account.role != request.required_role {
            counter!(ACCESS_CHECK, "outcome" => "denied").increment(1);
            return AccessResponse::denied();
        }

        counter!(ACCESS_CHECK, "outcome" => "granted").increment(1);
        AccessResponse::granted()
    }
}

/// Router for the access-check listener
pub fn create_rpc_router(service: AccessService) -> Router {
    Router::new()
        .route(authdb_common::CHECK_ACCESS_PATH, post(check_access_handler))
        .with_state(service)
}

async fn check_access_handler(
    State(service): State<AccessService>,
    Json(request): Json<AccessRequest>,
) -> Json<AccessResponse> {
    Json(service.check_access(&request).await)
}
