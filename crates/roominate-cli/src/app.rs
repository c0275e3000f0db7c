//! Wiring of stores, backend client and session manager.

use anyhow::Result;
use roominate_auth::{RestClient, SessionManager, SupabaseClient, TokenStore, TokenTier};
use roominate_config::{Config, Paths};
use roominate_storage::{open_encrypted_storage, open_plain_storage, AppPrefs};
use std::sync::Arc;
use tracing::{debug, info};

pub struct App {
    pub config: Config,
    pub backend: Arc<SupabaseClient>,
    pub manager: Arc<SessionManager>,
}

impl App {
    /// Open both token tiers and pick up any persisted session.
    pub async fn open(paths: &Paths, config: Config) -> Result<Self> {
        let plain = Arc::new(open_plain_storage(paths)?);
        let encrypted = Arc::new(open_encrypted_storage(paths)?);

        // Preferences share the plaintext file with the password session.
        let store = Arc::new(TokenStore::open(plain.clone(), TokenTier::Plain)?);
        let oauth_store = Arc::new(TokenStore::open(encrypted, TokenTier::Encrypted)?);
        let prefs = AppPrefs::new(plain);

        let backend = Arc::new(SupabaseClient::new(&config)?);
        let manager = Arc::new(SessionManager::new(
            backend.clone(),
            store,
            oauth_store,
            prefs,
            config.supabase_anon_key.clone(),
        ));

        let state = manager.restore().await?;
        debug!(state = ?state, "Session restored from disk");
        if manager.check_expiry().await? {
            info!("Stored session had expired");
        }

        Ok(Self {
            config,
            backend,
            manager,
        })
    }

    /// Table client authorised by whichever session is currently valid.
    pub fn rest(&self) -> RestClient {
        RestClient::new(
            self.backend.http_client().clone(),
            self.backend.base_url().clone(),
            self.manager.authorizer(),
        )
    }
}
