mod support;

use parking_lot::Mutex;
use roominate_auth::{
    AuthError, Credential, Profile, Role, SessionManager, SessionState, TokenStore, TokenTier,
};
use roominate_storage::{AppPrefs, MemoryStorage, SecureStorage, StorageError, StorageResult};
use std::sync::Arc;
use std::time::Duration;
use support::{auth_response, memory_store, rejected, ScriptedBackend};
use tokio::sync::Notify;

const ANON_KEY: &str = "anon-public-key";

struct Harness {
    backend: Arc<ScriptedBackend>,
    store: Arc<TokenStore>,
    oauth_store: Arc<TokenStore>,
    prefs: AppPrefs,
    manager: Arc<SessionManager>,
}

fn harness() -> Harness {
    let backend = ScriptedBackend::new();
    let store = memory_store(TokenTier::Plain);
    let oauth_store = memory_store(TokenTier::Encrypted);
    harness_with(backend, store, oauth_store)
}

fn harness_with(
    backend: Arc<ScriptedBackend>,
    store: Arc<TokenStore>,
    oauth_store: Arc<TokenStore>,
) -> Harness {
    let prefs = AppPrefs::new(Arc::new(MemoryStorage::new()));
    let manager = Arc::new(SessionManager::new(
        backend.clone(),
        store.clone(),
        oauth_store.clone(),
        prefs.clone(),
        ANON_KEY,
    ));
    Harness {
        backend,
        store,
        oauth_store,
        prefs,
        manager,
    }
}

#[tokio::test]
async fn sign_in_stores_session_and_caches_user() {
    let h = harness();
    h.backend
        .sign_in
        .lock()
        .push_back(Ok(auth_response("user-1", "access-1", Some("owner"))));

    let outcome = h.manager.sign_in("a@b.com", "secret1").await.unwrap();
    assert_eq!(outcome.user_id, "user-1");
    assert_eq!(outcome.role, Role::Owner);
    assert_eq!(h.manager.state(), SessionState::SignedIn);

    let session = h.store.read().unwrap();
    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.refresh_token.as_deref(), Some("access-1-refresh"));
    assert!(h.store.is_valid());

    assert_eq!(
        h.prefs.get_last_signed_email().unwrap().as_deref(),
        Some("a@b.com")
    );
    assert_eq!(h.prefs.get_user_role().unwrap().as_deref(), Some("owner"));

    let status = h.manager.status().unwrap();
    assert_eq!(status.state, SessionState::SignedIn);
    assert_eq!(status.token_tier, Some(TokenTier::Plain));
    assert_eq!(status.user_id.as_deref(), Some("user-1"));
    assert_eq!(status.expires_at, session.expires_at);
}

#[tokio::test]
async fn role_falls_back_to_profile_then_tenant() {
    let h = harness();
    h.backend.fetch_profile.lock().push_back(Ok(Some(Profile {
        id: "user-1".to_string(),
        role: Some("admin".to_string()),
        ..Profile::default()
    })));
    let outcome = h.manager.sign_in("a@b.com", "secret1").await.unwrap();
    assert_eq!(outcome.role, Role::Admin);
    assert_eq!(outcome.profile.unwrap().id, "user-1");

    let h = harness();
    h.backend
        .fetch_profile
        .lock()
        .push_back(Err(rejected(500, "relation \"profiles\" does not exist")));
    let outcome = h.manager.sign_in("a@b.com", "secret1").await.unwrap();
    assert_eq!(outcome.role, Role::Tenant);
    assert!(outcome.profile.is_none());
    assert_eq!(h.manager.state(), SessionState::SignedIn);
}

#[tokio::test]
async fn rejected_credentials_leave_signed_out() {
    let h = harness();
    h.backend
        .sign_in
        .lock()
        .push_back(Err(rejected(400, "Invalid login credentials")));

    let err = h.manager.sign_in("a@b.com", "wrong").await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid login credentials");
    assert_eq!(h.manager.state(), SessionState::SignedOut);
    assert!(h.store.read().is_none());
    assert_eq!(h.backend.count("fetch_profile"), 0);
}

#[tokio::test]
async fn invalid_input_never_reaches_the_backend() {
    let h = harness();
    assert!(matches!(
        h.manager.sign_in("a@b.com", "").await,
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        h.manager.sign_in("nope", "secret1").await,
        Err(AuthError::Validation(_))
    ));
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.manager.state(), SessionState::SignedOut);
}

#[tokio::test]
async fn sign_out_clears_everything_even_if_backend_fails() {
    let h = harness();
    h.manager.sign_in("a@b.com", "secret1").await.unwrap();
    h.backend
        .sign_out
        .lock()
        .push_back(Err(AuthError::Network("connection reset".to_string())));

    h.manager.sign_out().await.unwrap();

    assert_eq!(h.manager.state(), SessionState::SignedOut);
    assert!(h.store.read().is_none());
    assert!(h.prefs.get_user_data().unwrap().is_none());
    assert!(h.prefs.get_user_role().unwrap().is_none());
    assert_eq!(h.backend.count("sign_out"), 1);
    assert_eq!(h.manager.authorizer().credential(), Credential::Anonymous);

    // The last email survives sign-out for prefill.
    assert_eq!(
        h.prefs.get_last_signed_email().unwrap().as_deref(),
        Some("a@b.com")
    );
}

#[tokio::test]
async fn sign_out_while_signing_in_is_not_undone() {
    let h = harness();
    let gate = Arc::new(Notify::new());
    *h.backend.sign_in_gate.lock() = Some(gate.clone());

    let signing_in = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.sign_in("a@b.com", "secret1").await }
    });
    while h.backend.count("sign_in") == 0 {
        tokio::task::yield_now().await;
    }

    h.manager.sign_out().await.unwrap();
    gate.notify_one();

    let result = signing_in.await.unwrap();
    assert!(matches!(result, Err(AuthError::NotLoggedIn)));
    assert!(h.store.read().is_none());
    assert!(!h.store.is_valid());
    assert_eq!(h.manager.state(), SessionState::SignedOut);
}

#[tokio::test]
async fn sign_out_while_loading_profile_is_not_undone() {
    let h = harness();
    let gate = Arc::new(Notify::new());
    *h.backend.fetch_profile_gate.lock() = Some(gate.clone());

    let signing_in = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.sign_in("a@b.com", "secret1").await }
    });
    while h.backend.count("fetch_profile") == 0 {
        tokio::task::yield_now().await;
    }

    h.manager.sign_out().await.unwrap();
    gate.notify_one();

    let result = signing_in.await.unwrap();
    assert!(matches!(result, Err(AuthError::NotLoggedIn)));
    assert_eq!(h.manager.state(), SessionState::SignedOut);
    assert!(!h.store.is_valid());
    assert!(h.store.read().is_none());
    assert!(h.prefs.get_user_data().unwrap().is_none());
    assert!(h.prefs.get_user_role().unwrap().is_none());
}

/// Prefs backend that refuses every write.
struct ReadOnlyStorage;

impl ReadOnlyStorage {
    fn refuse() -> StorageError {
        StorageError::Io(std::io::Error::other("read-only"))
    }
}

impl SecureStorage for ReadOnlyStorage {
    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(Self::refuse())
    }

    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Ok(None)
    }

    fn delete(&self, _key: &str) -> StorageResult<bool> {
        Err(Self::refuse())
    }

    fn replace_many(&self, _set: &[(&str, &str)], _delete: &[&str]) -> StorageResult<()> {
        Err(Self::refuse())
    }
}

#[tokio::test]
async fn sign_in_succeeds_when_user_cache_cannot_be_written() {
    let backend = ScriptedBackend::new();
    let store = memory_store(TokenTier::Plain);
    let manager = SessionManager::new(
        backend.clone(),
        store.clone(),
        memory_store(TokenTier::Encrypted),
        AppPrefs::new(Arc::new(ReadOnlyStorage)),
        ANON_KEY,
    );

    let outcome = manager.sign_in("a@b.com", "secret1").await.unwrap();
    assert_eq!(outcome.user_id, "user-1");
    assert_eq!(manager.state(), SessionState::SignedIn);
    assert!(store.is_valid());
}

#[tokio::test]
async fn restore_picks_up_a_valid_session() {
    let store = memory_store(TokenTier::Plain);
    store.save("persisted", None, None, 3600).unwrap();
    let h = harness_with(ScriptedBackend::new(), store, memory_store(TokenTier::Encrypted));

    assert_eq!(h.manager.restore().await.unwrap(), SessionState::SignedIn);
    assert_eq!(
        h.manager.authorizer().credential(),
        Credential::User("persisted".to_string())
    );
}

#[tokio::test]
async fn restore_clears_an_expired_session() {
    let store = memory_store(TokenTier::Plain);
    store.save("stale", None, None, 0).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    let h = harness_with(ScriptedBackend::new(), store, memory_store(TokenTier::Encrypted));

    assert_eq!(h.manager.restore().await.unwrap(), SessionState::SignedOut);
    assert!(h.store.read().is_none());
}

#[tokio::test]
async fn check_expiry_signs_out_a_lapsed_session() {
    let store = memory_store(TokenTier::Plain);
    store.save("short", None, None, 1).unwrap();
    let h = harness_with(ScriptedBackend::new(), store, memory_store(TokenTier::Encrypted));
    h.manager.restore().await.unwrap();

    assert!(!h.manager.check_expiry().await.unwrap());
    assert_eq!(h.manager.state(), SessionState::SignedIn);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(h.manager.check_expiry().await.unwrap());
    assert_eq!(h.manager.state(), SessionState::SignedOut);
    assert!(h.store.read().is_none());

    // Nothing left to expire.
    assert!(!h.manager.check_expiry().await.unwrap());
}

#[tokio::test]
async fn oauth_callback_lands_in_the_encrypted_tier() {
    let h = harness();
    let session = h
        .manager
        .complete_oauth_callback(
            "roominate://auth-callback#access_token=oauth-at&refresh_token=oauth-rt&token_type=bearer&expires_in=3600",
        )
        .await
        .unwrap();

    assert_eq!(session.access_token, "oauth-at");
    assert_eq!(h.oauth_store.read().unwrap().access_token, "oauth-at");
    assert!(h.store.read().is_none());
    assert_eq!(h.manager.state(), SessionState::SignedIn);
    assert_eq!(
        h.manager.authorizer().credential(),
        Credential::User("oauth-at".to_string())
    );
    assert_eq!(h.manager.status().unwrap().token_tier, Some(TokenTier::Encrypted));

    h.manager.sign_out().await.unwrap();
    assert!(h.oauth_store.read().is_none());
    assert_eq!(h.backend.count("sign_out"), 1);
}

#[tokio::test]
async fn oauth_error_redirect_changes_nothing() {
    let h = harness();
    let err = h
        .manager
        .complete_oauth_callback(
            "roominate://auth-callback#error=access_denied&error_description=User+cancelled",
        )
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "User cancelled");
    assert!(h.oauth_store.read().is_none());
    assert_eq!(h.manager.state(), SessionState::SignedOut);
}

#[tokio::test]
async fn state_changes_are_reported_in_order() {
    let h = harness();
    let seen = Arc::new(Mutex::new(Vec::new()));
    h.manager.set_state_callback(Box::new({
        let seen = seen.clone();
        move |state| seen.lock().push(state)
    }));

    h.manager.sign_in("a@b.com", "secret1").await.unwrap();
    h.manager.sign_out().await.unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            SessionState::SigningIn,
            SessionState::SignedIn,
            SessionState::SigningOut,
            SessionState::SignedOut,
        ]
    );
}
