//! The single owner of persisted session tokens.
//!
//! Writers (`save`, `clear`) are serialised by one mutex so that a save racing
//! a logout can never leave a mixture of fields behind. Readers only touch an
//! immutable snapshot and never wait on storage I/O.

use crate::types::SessionTokens;
use crate::{AuthError, AuthResult};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use roominate_storage::{SecureStorage, StorageKeys};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifetime assumed when the backend omits `expires_in`.
pub(crate) const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// A stored user session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Usable at `now`: a token is present and `expires_at` lies after `now`.
    /// A session without an expiry is never treated as valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expires_at.is_some_and(|exp| exp > now)
    }
}

/// Which persisted key set backs a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTier {
    /// Ordinary session bookkeeping from email/password sign-in.
    Plain,
    /// Tokens delivered through an external OAuth redirect.
    Encrypted,
}

struct TierKeys {
    access_token: &'static str,
    refresh_token: &'static str,
    token_type: &'static str,
    expires_at: &'static str,
}

impl TokenTier {
    fn keys(&self) -> TierKeys {
        match self {
            TokenTier::Plain => TierKeys {
                access_token: StorageKeys::ACCESS_TOKEN,
                refresh_token: StorageKeys::REFRESH_TOKEN,
                token_type: StorageKeys::TOKEN_TYPE,
                expires_at: StorageKeys::EXPIRES_AT,
            },
            TokenTier::Encrypted => TierKeys {
                access_token: StorageKeys::OAUTH_ACCESS_TOKEN,
                refresh_token: StorageKeys::OAUTH_REFRESH_TOKEN,
                token_type: StorageKeys::OAUTH_TOKEN_TYPE,
                expires_at: StorageKeys::OAUTH_EXPIRES_AT,
            },
        }
    }
}

/// Session token store over one storage tier.
pub struct TokenStore {
    tier: TokenTier,
    storage: Arc<dyn SecureStorage>,
    write_lock: Mutex<()>,
    snapshot: RwLock<Option<Arc<Session>>>,
    generation: AtomicU64,
}

impl TokenStore {
    /// Open a store over `storage`, loading any session already persisted.
    ///
    /// For [`TokenTier::Encrypted`] the caller passes an encrypting backend;
    /// the store itself only picks the key names.
    pub fn open(storage: Arc<dyn SecureStorage>, tier: TokenTier) -> AuthResult<Self> {
        let snapshot = load_session(storage.as_ref(), tier)?.map(Arc::new);
        debug!(tier = ?tier, present = snapshot.is_some(), "Opened token store");
        Ok(Self {
            tier,
            storage,
            write_lock: Mutex::new(()),
            snapshot: RwLock::new(snapshot),
            generation: AtomicU64::new(0),
        })
    }

    pub fn tier(&self) -> TokenTier {
        self.tier
    }

    /// Store a new session, replacing any previous one as a whole.
    ///
    /// `expires_at` is computed as now plus `expires_in_secs`.
    pub fn save(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        token_type: Option<&str>,
        expires_in_secs: u64,
    ) -> AuthResult<Arc<Session>> {
        let _guard = self.write_lock.lock();
        self.write_locked(access_token, refresh_token, token_type, expires_in_secs)
    }

    /// Like [`save`](Self::save), but a no-op returning `Ok(None)` if a
    /// [`clear`](Self::clear) happened since `expected_generation` was read.
    pub fn save_if_generation(
        &self,
        expected_generation: u64,
        access_token: &str,
        refresh_token: Option<&str>,
        token_type: Option<&str>,
        expires_in_secs: u64,
    ) -> AuthResult<Option<Arc<Session>>> {
        let _guard = self.write_lock.lock();
        if self.generation.load(Ordering::Acquire) != expected_generation {
            debug!(tier = ?self.tier, "Session cleared while request was in flight; not saving");
            return Ok(None);
        }
        self.write_locked(access_token, refresh_token, token_type, expires_in_secs)
            .map(Some)
    }

    fn write_locked(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        token_type: Option<&str>,
        expires_in_secs: u64,
    ) -> AuthResult<Arc<Session>> {
        if access_token.is_empty() {
            return Err(AuthError::Validation("Access token is empty".to_string()));
        }

        let expires_at = i64::try_from(expires_in_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::Validation(format!("Token lifetime out of range: {expires_in_secs}s"))
            })?;

        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            token_type: token_type.map(str::to_string),
            expires_at: Some(expires_at),
        };

        let keys = self.tier.keys();
        let expires_at_raw = expires_at.to_rfc3339();
        let mut entries = vec![
            (keys.access_token, session.access_token.as_str()),
            (keys.expires_at, expires_at_raw.as_str()),
        ];
        let mut stale = Vec::new();
        match session.refresh_token.as_deref() {
            Some(token) => entries.push((keys.refresh_token, token)),
            None => stale.push(keys.refresh_token),
        }
        match session.token_type.as_deref() {
            Some(kind) => entries.push((keys.token_type, kind)),
            None => stale.push(keys.token_type),
        }

        // One commit: a failure leaves the previous session untouched on disk
        // and in the snapshot.
        self.storage.replace_many(&entries, &stale)?;

        let session = Arc::new(session);
        *self.snapshot.write() = Some(session.clone());
        debug!(tier = ?self.tier, expires_at = %expires_at_raw, "Session saved");
        Ok(session)
    }

    /// Current session, if one was saved and not cleared.
    pub fn read(&self) -> Option<Arc<Session>> {
        self.snapshot.read().clone()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.snapshot
            .read()
            .as_ref()
            .is_some_and(|session| session.is_valid_at(now))
    }

    /// Access token if the session is currently valid.
    pub fn valid_access_token(&self) -> Option<String> {
        let now = Utc::now();
        self.snapshot
            .read()
            .as_ref()
            .filter(|session| session.is_valid_at(now))
            .map(|session| session.access_token.clone())
    }

    /// Remove every session field.
    ///
    /// The in-memory snapshot is dropped before storage is touched, so even
    /// when the storage delete fails no reader sees the old session again.
    pub fn clear(&self) -> AuthResult<()> {
        let _guard = self.write_lock.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.snapshot.write() = None;

        let keys = self.tier.keys();
        self.storage.delete_many(&[
            keys.access_token,
            keys.refresh_token,
            keys.token_type,
            keys.expires_at,
        ])?;
        debug!(tier = ?self.tier, "Session cleared");
        Ok(())
    }

    /// Counter bumped by every [`clear`](Self::clear).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Persist `tokens` from a blocking task unless `store` was cleared since
/// `generation` was read.
pub(crate) async fn save_tokens(
    store: &Arc<TokenStore>,
    generation: u64,
    tokens: &SessionTokens,
) -> AuthResult<Option<Arc<Session>>> {
    let store = store.clone();
    let tokens = tokens.clone();
    tokio::task::spawn_blocking(move || {
        store.save_if_generation(
            generation,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
            tokens.token_type.as_deref(),
            tokens.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        )
    })
    .await?
}

/// Clear `store` from a blocking task.
pub(crate) async fn clear_store(store: &Arc<TokenStore>) -> AuthResult<()> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.clear()).await?
}

fn load_session(storage: &dyn SecureStorage, tier: TokenTier) -> AuthResult<Option<Session>> {
    let keys = tier.keys();
    let Some(access_token) = storage.get(keys.access_token)?.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    let expires_at = match storage.get(keys.expires_at)? {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(e) => {
                warn!(tier = ?tier, error = %e, "Stored expiry is unreadable; treating session as expired");
                None
            }
        },
        None => None,
    };

    Ok(Some(Session {
        access_token,
        refresh_token: storage.get(keys.refresh_token)?,
        token_type: storage.get(keys.token_type)?,
        expires_at,
    }))
}
