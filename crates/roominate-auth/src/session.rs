//! Session lifecycle: sign-in, sign-out, restore on startup, expiry detection
//! and OAuth callbacks, tracked by the [`SessionMachine`] FSM.

use crate::backend::AuthBackend;
use crate::oauth::parse_callback;
use crate::session_fsm::{SessionMachine, SessionMachineInput, SessionState};
use crate::token_store::{clear_store, save_tokens};
use crate::types::{Profile, Role, SessionTokens};
use crate::validation::validate_email;
use crate::{AuthError, AuthResult, RequestAuthorizer, Session, TokenStore, TokenTier};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use roominate_storage::AppPrefs;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful sign-in, used for dashboard routing.
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
    pub profile: Option<Profile>,
}

/// Snapshot for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Tier of the session currently authorising requests, if any.
    pub token_tier: Option<TokenTier>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub last_signed_email: Option<String>,
}

/// Callback type for session state change notifications.
pub type SessionStateCallback = Box<dyn Fn(SessionState) + Send + Sync>;

/// Owns the session stores and the lifecycle FSM.
pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    store: Arc<TokenStore>,
    oauth_store: Arc<TokenStore>,
    prefs: AppPrefs,
    anon_key: String,
    fsm: Mutex<SessionMachine>,
    state_callback: Mutex<Option<SessionStateCallback>>,
}

impl SessionManager {
    /// `store` holds password sign-in sessions; `oauth_store` holds tokens
    /// from OAuth redirects and should be backed by encrypted storage.
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<TokenStore>,
        oauth_store: Arc<TokenStore>,
        prefs: AppPrefs,
        anon_key: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            oauth_store,
            prefs,
            anon_key: anon_key.into(),
            fsm: Mutex::new(SessionMachine::new()),
            state_callback: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn oauth_store(&self) -> &Arc<TokenStore> {
        &self.oauth_store
    }

    pub fn prefs(&self) -> &AppPrefs {
        &self.prefs
    }

    pub fn backend(&self) -> &Arc<dyn AuthBackend> {
        &self.backend
    }

    /// Request authorizer over both stores, password session first.
    pub fn authorizer(&self) -> RequestAuthorizer {
        RequestAuthorizer::new(self.anon_key.clone(), self.store.clone())
            .with_store(self.oauth_store.clone())
    }

    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    pub fn state(&self) -> SessionState {
        SessionState::from(self.fsm.lock().state())
    }

    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        self.transition_if(input, || Ok(()))
    }

    /// Apply `input` only if `check` passes. The check runs under the FSM
    /// lock, so nothing else can move the machine in between.
    fn transition_if<F>(&self, input: &SessionMachineInput, check: F) -> AuthResult<SessionState>
    where
        F: FnOnce() -> AuthResult<()>,
    {
        let mut fsm = self.fsm.lock();
        check()?;
        let old_state = SessionState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = SessionState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "Session state transition");
            if let Some(callback) = self.state_callback.lock().as_ref() {
                callback(new_state);
            }
        }

        Ok(new_state)
    }

    /// Pick up a persisted session on startup.
    ///
    /// A stored session that has already expired is cleared.
    pub async fn restore(&self) -> AuthResult<SessionState> {
        if self.state() != SessionState::SignedOut {
            return Ok(self.state());
        }

        let mut restored = false;
        for store in [&self.store, &self.oauth_store] {
            match store.read() {
                Some(_) if store.is_valid() => restored = true,
                Some(_) => {
                    info!(tier = ?store.tier(), "Stored session expired; clearing");
                    clear_store(store).await?;
                }
                None => {}
            }
        }

        if restored {
            info!("Session restored");
            self.transition(&SessionMachineInput::SessionRestored)
        } else {
            Ok(self.state())
        }
    }

    /// Sign in with email and password.
    ///
    /// - SignedOut -> SigningIn -> (SignedIn | SignedOut)
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<SignInOutcome> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }

        self.transition(&SessionMachineInput::SignInAttempt)?;
        let generation = self.store.generation();

        let result = match self.sign_in_inner(&email, password, generation).await {
            Ok(outcome) => self
                .transition_if(&SessionMachineInput::SignInSuccess, || {
                    self.ensure_not_cleared(generation)
                })
                .map(|_| outcome),
            Err(err) => Err(err),
        };

        match result {
            Ok(outcome) => {
                info!(user_id = %outcome.user_id, role = %outcome.role, "Sign in successful");
                Ok(outcome)
            }
            Err(err) => {
                if matches!(err, AuthError::NotLoggedIn) {
                    self.forget_user().await;
                }
                let _ = self.transition(&SessionMachineInput::SignInFailed);
                warn!(error = %err, "Sign in failed");
                Err(err)
            }
        }
    }

    async fn sign_in_inner(
        &self,
        email: &str,
        password: &str,
        generation: u64,
    ) -> AuthResult<SignInOutcome> {
        let response = self.backend.sign_in_with_password(email, password).await?;

        let tokens = response.tokens().ok_or_else(|| {
            AuthError::Parse("Sign in response is missing the access token".to_string())
        })?;
        let user_id = response
            .user_id()
            .ok_or_else(|| AuthError::Parse("Sign in response is missing the user id".to_string()))?
            .to_string();

        if save_tokens(&self.store, generation, &tokens).await?.is_none() {
            return Err(AuthError::NotLoggedIn);
        }

        let profile = match self.backend.fetch_profile(&user_id, &tokens.access_token).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                debug!(user_id = %user_id, "No profile row; using default role");
                None
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Profile fetch failed; using default role");
                None
            }
        };

        let metadata_role = response.user.as_ref().and_then(|user| user.metadata_role());
        let role = metadata_role
            .or_else(|| profile.as_ref().and_then(Profile::role))
            .unwrap_or_default();

        // A sign-out while the profile was loading wins over this sign-in.
        self.ensure_not_cleared(generation)?;

        let snapshot = match &profile {
            Some(profile) => serde_json::to_value(profile),
            None => match &response.user {
                Some(user) => serde_json::to_value(user),
                None => serde_json::to_value(Profile::fallback(&user_id)),
            },
        };
        match snapshot {
            Ok(snapshot) => self.remember_user(email, snapshot, role).await,
            Err(err) => warn!(user_id = %user_id, error = %err, "Failed to encode user data"),
        }

        Ok(SignInOutcome {
            user_id,
            email: response
                .user
                .as_ref()
                .and_then(|user| user.email.clone())
                .or_else(|| Some(email.to_string())),
            role,
            profile,
        })
    }

    fn ensure_not_cleared(&self, generation: u64) -> AuthResult<()> {
        if self.store.generation() != generation {
            info!("Signed out while signing in; discarding sign-in");
            return Err(AuthError::NotLoggedIn);
        }
        Ok(())
    }

    /// Undo a user-data write that raced a sign-out.
    async fn forget_user(&self) {
        let prefs = self.prefs.clone();
        let result = tokio::task::spawn_blocking(move || prefs.clear_user_data()).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "Failed to drop cached user data"),
            Err(err) => warn!(error = %err, "Failed to drop cached user data"),
        }
    }

    async fn remember_user(&self, email: &str, snapshot: Value, role: Role) {
        let prefs = self.prefs.clone();
        let email = email.to_string();
        let result = tokio::task::spawn_blocking(move || {
            prefs.set_last_signed_email(&email)?;
            prefs.set_user_data(&snapshot, role.as_str())
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "Failed to cache user data"),
            Err(err) => warn!(error = %err, "Failed to cache user data"),
        }
    }

    /// Sign out. Local state is always cleared; the remote revoke is
    /// best-effort.
    ///
    /// - SignedIn -> SigningOut -> SignedOut
    pub async fn sign_out(&self) -> AuthResult<()> {
        let _ = self.transition(&SessionMachineInput::SignOutRequested);

        let token = self
            .store
            .valid_access_token()
            .or_else(|| self.oauth_store.valid_access_token());

        let cleared = self.clear_local().await;

        if let Some(token) = token {
            if let Err(err) = self.backend.sign_out(&token).await {
                warn!(error = %err, "Remote sign out failed; local session already cleared");
            }
        }

        let _ = self.transition(&SessionMachineInput::SignOutComplete);
        if self.state() == SessionState::SignedIn {
            // A racing sign-in finished before the clear; its session is gone.
            let _ = self.transition(&SessionMachineInput::SessionExpired);
        }
        info!("Signed out");
        cleared
    }

    async fn clear_local(&self) -> AuthResult<()> {
        let plain = clear_store(&self.store).await;
        let oauth = clear_store(&self.oauth_store).await;
        let prefs = self.prefs.clone();
        let profile = tokio::task::spawn_blocking(move || prefs.clear_user_data())
            .await
            .map_err(AuthError::from)
            .and_then(|r| r.map_err(AuthError::from));
        plain.and(oauth).and(profile)
    }

    /// Clear the session if it is signed in but no longer valid.
    ///
    /// Returns true when an expiry was detected.
    pub async fn check_expiry(&self) -> AuthResult<bool> {
        if self.state() != SessionState::SignedIn {
            return Ok(false);
        }
        if self.store.is_valid() || self.oauth_store.is_valid() {
            return Ok(false);
        }

        info!("Session expired; clearing");
        let cleared = self.clear_local().await;
        self.transition(&SessionMachineInput::SessionExpired)?;
        cleared.map(|()| true)
    }

    /// Store the tokens carried by an OAuth redirect in the encrypted tier.
    pub async fn complete_oauth_callback(&self, callback: &str) -> AuthResult<Arc<Session>> {
        let callback = parse_callback(callback)?;
        let generation = self.oauth_store.generation();
        let tokens = SessionTokens {
            access_token: callback.access_token,
            refresh_token: callback.refresh_token,
            token_type: callback.token_type,
            expires_in: callback.expires_in,
        };

        let session = save_tokens(&self.oauth_store, generation, &tokens)
            .await?
            .ok_or(AuthError::NotLoggedIn)?;
        self.transition(&SessionMachineInput::CallbackReceived)?;
        info!("OAuth session stored");
        Ok(session)
    }

    pub fn status(&self) -> AuthResult<SessionStatus> {
        let now = Utc::now();
        let active = [&self.store, &self.oauth_store]
            .into_iter()
            .find_map(|store| {
                store
                    .read()
                    .filter(|session| session.is_valid_at(now))
                    .map(|session| (store.tier(), session))
            });

        let user_data = self.prefs.get_user_data()?;
        let user_id = user_data
            .as_ref()
            .and_then(|data| data.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(SessionStatus {
            state: self.state(),
            token_tier: active.as_ref().map(|(tier, _)| *tier),
            expires_at: active.as_ref().and_then(|(_, session)| session.expires_at),
            user_id,
            role: self.prefs.get_user_role()?,
            last_signed_email: self.prefs.get_last_signed_email()?,
        })
    }
}
