use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authdb_common::SignupForm;
use chrono::Utc;
use metrics::counter;
use zeroize::Zeroizing;

use crate::auth::password::{hash_password_secure, verify_password, HashCost};
use crate::auth::{AuthService, LoginGrant, SessionStore, TokenIssuer};
use crate::config::Settings;
use crate::error::AppError;
use crate::events::{notify, AccountEvent, EventSink};
use crate::metrics::{ACCOUNT_DELETED, LOGIN_FAILURE, LOGIN_SUCCESS, SIGNUP};
use crate::storage::{
    with_deadline, Account, AccountField, AccountStore, NewAccount, StoreError, DEFAULT_ROLE,
};
use crate::validation::{validate_signup, AccountUpdate};

/// Tunables of the account service
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub hash_cost: HashCost,
    /// Session lifetime when "remember me" is ticked
    pub remember_me_ttl: Duration,
    /// Deadline for each account store call
    pub store_timeout: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            hash_cost: HashCost::default(),
            remember_me_ttl: Duration::from_secs(60 * 60 * 24 * 15),
            store_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&Settings> for AuthPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            hash_cost: settings.password_hash,
            remember_me_ttl: settings.remember_me_ttl(),
            store_timeout: settings.store_timeout(),
        }
    }
}

pub struct DefaultAuth {
    accounts: Arc<dyn AccountStore>,
    sessions: SessionStore,
    tokens: Arc<TokenIssuer>,
    events: Arc<dyn EventSink>,
    policy: AuthPolicy,
}

impl DefaultAuth {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: SessionStore,
        tokens: Arc<TokenIssuer>,
        events: Arc<dyn EventSink>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            accounts,
            sessions,
            tokens,
            events,
            policy,
        }
    }

    async fn verify(&self, hash: &str, plain: &str) -> Result<bool, AppError> {
        let hash = hash.to_owned();
        let plain = Zeroizing::new(plain.to_owned());
        let matches = tokio::task::spawn_blocking(move || verify_password(&hash, &plain)).await?;
        Ok(matches)
    }

    async fn hash(&self, mut plain: String) -> Result<String, AppError> {
        let cost = self.policy.hash_cost;
        let hash = tokio::task::spawn_blocking(move || hash_password_secure(&mut plain, &cost))
            .await??;
        Ok(hash)
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn signup(&self, form: &SignupForm) -> Result<Account, AppError> {
        let valid = validate_signup(form)?;
        let deadline = self.policy.store_timeout;

        if with_deadline(
            deadline,
            self.accounts
                .exists_by_login_or_email(&valid.login, &valid.email),
        )
        .await?
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let hash = self.hash(valid.password).await?;
        let new_account = NewAccount::new(valid.login, valid.email, hash, DEFAULT_ROLE);
        let account = match with_deadline(deadline, self.accounts.insert(new_account)).await {
            Ok(account) => account,
            // lost a race with a concurrent signup
            Err(StoreError::Conflict(_)) => {
                return Err(AppError::Conflict("User already exists".to_string()))
            },
            Err(e) => return Err(e.into()),
        };

        counter!(SIGNUP).increment(1);
        tracing::info!(user_id = account.id, login = %account.login, "account created");
        notify(
            &self.events,
            AccountEvent::Signup {
                user_id: account.id,
                email: account.email.clone(),
                timestamp: account.created_at,
            },
        );
        Ok(account)
    }

    async fn login(
        &self,
        login: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<LoginGrant, AppError> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "You must provide a login and password".to_string(),
            ));
        }

        let account = match with_deadline(
            self.policy.store_timeout,
            self.accounts.find_by_login(login),
        )
        .await
        {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                counter!(LOGIN_FAILURE, "reason" => "unknown_login").increment(1);
                tracing::warn!(%login, "login for unknown account");
                return Err(AppError::NotFound("account".to_string()));
            },
            Err(e) => {
                tracing::error!(error = %e, "account lookup failed during login");
                return Err(e.into());
            },
        };

        if !self.verify(&account.password_hash, password).await? {
            counter!(LOGIN_FAILURE, "reason" => "bad_password").increment(1);
            tracing::warn!(user_id = account.id, "incorrect password");
            return Err(AppError::InvalidPassword);
        }

        let lifetime = if remember_me {
            self.policy.remember_me_ttl
        } else {
            self.tokens.ttl()
        };
        let issued = self.tokens.issue_with_ttl(account.id, lifetime)?;
        self.sessions
            .put(issued.token.clone(), account.clone(), issued.expires_at);

        counter!(LOGIN_SUCCESS).increment(1);
        tracing::info!(user_id = account.id, remember_me, "user logged in");
        notify(
            &self.events,
            AccountEvent::Login {
                user_id: account.id,
                email: account.email.clone(),
                timestamp: Utc::now(),
            },
        );

        Ok(LoginGrant {
            token: issued.token,
            expires_at: issued.expires_at,
            lifetime,
            account,
        })
    }

    fn authenticate(&self, token: &str) -> Option<Account> {
        let claims = match self.tokens.parse(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "token rejected");
                return None;
            },
        };
        self.sessions
            .get(token)
            .filter(|account| account.id == claims.sub)
    }

    fn logout(&self, token: &str) {
        self.sessions.remove(token);
    }

    async fn update_account(
        &self,
        account: &Account,
        update: AccountUpdate,
    ) -> Result<Account, AppError> {
        let deadline = self.policy.store_timeout;
        let current = with_deadline(deadline, self.accounts.find_by_id(account.id)).await?;

        let (field, event) = match update {
            AccountUpdate::Login(new_login) => {
                if new_login == current.login {
                    return Err(AppError::Validation(
                        "The new login matches the current one".to_string(),
                    ));
                }
                let event = AccountEvent::UpdateLogin {
                    user_id: current.id,
                    new_login: new_login.clone(),
                    timestamp: Utc::now(),
                };
                (AccountField::Login(new_login), event)
            },
            AccountUpdate::Email(new_email) => {
                if new_email.eq_ignore_ascii_case(&current.email) {
                    return Err(AppError::Validation(
                        "The new email matches the current one".to_string(),
                    ));
                }
                let event = AccountEvent::UpdateEmail {
                    user_id: current.id,
                    new_email: new_email.clone(),
                    timestamp: Utc::now(),
                };
                (AccountField::Email(new_email), event)
            },
            AccountUpdate::Password(new_password) => {
                if self.verify(&current.password_hash, &new_password).await? {
                    return Err(AppError::Validation(
                        "The new password matches the current one".to_string(),
                    ));
                }
                let hash = self.hash(new_password).await?;
                let event = AccountEvent::UpdatePassword {
                    user_id: current.id,
                    timestamp: Utc::now(),
                };
                (AccountField::PasswordHash(hash), event)
            },
        };

        let updated = with_deadline(deadline, self.accounts.update_field(current.id, field)).await?;
        self.sessions.refresh_account(&updated);

        tracing::info!(user_id = updated.id, "account updated");
        notify(&self.events, event);
        Ok(updated)
    }

    async fn delete_account(&self, account: &Account) -> Result<(), AppError> {
        match with_deadline(self.policy.store_timeout, self.accounts.delete(account.id)).await {
            Ok(()) | Err(StoreError::NotFound) => {},
            Err(e) => {
                tracing::error!(user_id = account.id, error = %e, "failed to delete account");
                return Err(e.into());
            },
        }

        let dropped = self.sessions.remove_account(account.id);
        counter!(ACCOUNT_DELETED).increment(1);
        tracing::info!(user_id = account.id, sessions = dropped, "account deleted");
        notify(
            &self.events,
            AccountEvent::DeleteAccount {
                user_id: account.id,
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(with_deadline(self.policy.store_timeout, self.accounts.list()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::test_cost;
    use crate::auth::token::test_secret;
    use crate::events::ChannelEventSink;
    use crate::storage::testing::HungStore;
    use crate::storage::FlatFileStorage;
    use authdb_common::AccountId;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        auth: DefaultAuth,
        sessions: SessionStore,
        events: UnboundedReceiver<AccountEvent>,
    }

    fn harness_with(accounts: Arc<dyn AccountStore>, store_timeout: Duration) -> Harness {
        let sessions = SessionStore::new();
        let tokens = Arc::new(TokenIssuer::new(&test_secret(), Duration::from_secs(3600)).unwrap());
        let (sink, events) = ChannelEventSink::new();
        let policy = AuthPolicy {
            hash_cost: test_cost(),
            store_timeout,
            ..AuthPolicy::default()
        };
        let auth = DefaultAuth::new(accounts, sessions.clone(), tokens, Arc::new(sink), policy);
        Harness {
            auth,
            sessions,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(FlatFileStorage::in_memory()), Duration::from_secs(2))
    }

    fn form(login: &str, email: &str, password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            login: login.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    async fn bob(h: &Harness) -> Account {
        h.auth
            .signup(&form("bobby", "bob@x.com", "hunter2", "hunter2"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn signup_creates_user_with_default_role() {
        let mut h = harness();
        let account = bob(&h).await;
        assert_eq!(account.role, DEFAULT_ROLE);
        assert!(account.password_hash.starts_with("$scrypt$"));
        assert!(matches!(
            h.events.recv().await,
            Some(AccountEvent::Signup { user_id, .. }) if user_id == account.id
        ));
    }

    #[tokio::test]
    async fn signup_rejections() {
        let h = harness();
        bob(&h).await;

        let err = h
            .auth
            .signup(&form("12345", "n@x.com", "pass1", "pass1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = h
            .auth
            .signup(&form("alice", "a@x.com", "abc", "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = h
            .auth
            .signup(&form("alice", "a@x.com", "pass1", "pass2"))
            .await
            .unwrap_err();
        assert_eq!(err.form_message(), "Password mismatch");

        let err = h
            .auth
            .signup(&form("bobby", "bob@x.com", "hunter2", "hunter2"))
            .await
            .unwrap_err();
        assert_eq!(err.form_message(), "User already exists");
        assert_eq!(h.auth.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn login_opens_session_for_same_account() {
        let h = harness();
        let account = bob(&h).await;

        let grant = h.auth.login(" bobby ", "hunter2", false).await.unwrap();
        assert_eq!(grant.account.id, account.id);
        assert_eq!(grant.lifetime, Duration::from_secs(3600));
        assert_eq!(h.auth.authenticate(&grant.token).unwrap().id, account.id);

        let remembered = h.auth.login("bobby", "hunter2", true).await.unwrap();
        assert_eq!(remembered.lifetime, AuthPolicy::default().remember_me_ttl);
        assert_ne!(remembered.token, grant.token);
        assert_eq!(h.sessions.len(), 2);
    }

    #[tokio::test]
    async fn failed_logins_insert_no_session() {
        let h = harness();
        bob(&h).await;

        let err = h.auth.login("bobby", "wrong1", false).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPassword));
        assert_eq!(err.form_message(), "Incorrect password");

        let err = h.auth.login("nobody", "hunter2", false).await.unwrap_err();
        assert_eq!(err.form_message(), "User not found");

        let err = h.auth.login("", "", false).await.unwrap_err();
        assert_eq!(err.form_message(), "You must provide a login and password");

        assert!(h.sessions.is_empty());
    }

    #[tokio::test]
    async fn logout_and_garbage_tokens() {
        let h = harness();
        bob(&h).await;
        let grant = h.auth.login("bobby", "hunter2", false).await.unwrap();

        assert!(h.auth.authenticate("not-a-token").is_none());
        h.auth.logout(&grant.token);
        h.auth.logout(&grant.token);
        assert!(h.auth.authenticate(&grant.token).is_none());
    }

    #[tokio::test]
    async fn update_targets_the_callers_account() {
        let h = harness();
        let bob = bob(&h).await;
        let alice = h
            .auth
            .signup(&form("alice", "alice@x.com", "secret7", "secret7"))
            .await
            .unwrap();
        let grant = h.auth.login("bobby", "hunter2", false).await.unwrap();

        let updated = h
            .auth
            .update_account(&bob, AccountUpdate::Password("newpass9".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.id, bob.id);
        assert!(h.auth.login("bobby", "newpass9", false).await.is_ok());
        assert!(h.auth.login("alice", "secret7", false).await.is_ok());
        assert_eq!(
            h.auth.authenticate(&grant.token).unwrap().password_hash,
            updated.password_hash
        );

        let renamed = h
            .auth
            .update_account(&bob, AccountUpdate::Login("robert".to_string()))
            .await
            .unwrap();
        assert_eq!(h.auth.authenticate(&grant.token).unwrap().login, "robert");
        assert_eq!(renamed.email, "bob@x.com");

        let err = h
            .auth
            .update_account(&bob, AccountUpdate::Email(alice.email.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_to_current_value_is_rejected() {
        let h = harness();
        let bob = bob(&h).await;

        for update in [
            AccountUpdate::Login("bobby".to_string()),
            AccountUpdate::Email("BOB@x.com".to_string()),
            AccountUpdate::Password("hunter2".to_string()),
        ] {
            let err = h.auth.update_account(&bob, update).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn deleted_account_tokens_are_rejected() {
        let h = harness();
        let bob = bob(&h).await;
        let first = h.auth.login("bobby", "hunter2", false).await.unwrap();
        let second = h.auth.login("bobby", "hunter2", true).await.unwrap();

        h.auth.delete_account(&bob).await.unwrap();

        assert!(h.auth.authenticate(&first.token).is_none());
        assert!(h.auth.authenticate(&second.token).is_none());
        assert!(h.sessions.is_empty());
        assert!(h.auth.list_accounts().await.unwrap().is_empty());
        // deleting again is harmless
        h.auth.delete_account(&bob).await.unwrap();
    }

    /// Store whose existence check misses an account that `insert` then
    /// finds, as when two signups race
    struct RacingStore(FlatFileStorage);

    #[async_trait]
    impl AccountStore for RacingStore {
        async fn find_by_login(&self, login: &str) -> Result<Account, StoreError> {
            self.0.find_by_login(login).await
        }

        async fn find_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
            self.0.find_by_id(id).await
        }

        async fn exists_by_login_or_email(
            &self,
            _login: &str,
            _email: &str,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
            self.0.insert(account).await
        }

        async fn update_field(
            &self,
            id: AccountId,
            field: AccountField,
        ) -> Result<Account, StoreError> {
            self.0.update_field(id, field).await
        }

        async fn delete(&self, id: AccountId) -> Result<(), StoreError> {
            self.0.delete(id).await
        }

        async fn list(&self) -> Result<Vec<Account>, StoreError> {
            self.0.list().await
        }
    }

    #[tokio::test]
    async fn signup_losing_insert_race_reports_existing_user() {
        let inner = FlatFileStorage::in_memory();
        inner
            .insert(NewAccount::new("bobby", "bob@x.com", "$scrypt$", DEFAULT_ROLE))
            .await
            .unwrap();
        let mut h = harness_with(Arc::new(RacingStore(inner)), Duration::from_secs(2));

        let err = h
            .auth
            .signup(&form("bobby", "other@x.com", "hunter2", "hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.form_message(), "User already exists");
        assert!(h.events.try_recv().is_err());
        assert_eq!(h.auth.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_store_surfaces_as_unavailable() {
        let h = harness_with(Arc::new(HungStore), Duration::from_millis(100));

        let err = h.auth.login("bobby", "hunter2", false).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));

        let err = h
            .auth
            .signup(&form("bobby", "bob@x.com", "hunter2", "hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(h.sessions.is_empty());
    }
}
