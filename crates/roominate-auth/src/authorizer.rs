//! Attaches the right credential to every outgoing backend request.

use crate::TokenStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::trace;

/// The credential chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A valid user access token.
    User(String),
    /// No usable user session; the anonymous key is sent instead.
    Anonymous,
}

/// Decorates requests with `apikey` and `Authorization` headers.
///
/// `apikey` always carries the anonymous key. `Authorization` carries the
/// first currently valid user token among the attached stores, or the
/// anonymous key when none is valid. The choice is made per request and the
/// stores are only ever read.
#[derive(Clone)]
pub struct RequestAuthorizer {
    anon_key: String,
    stores: Vec<Arc<TokenStore>>,
}

impl RequestAuthorizer {
    pub fn new(anon_key: impl Into<String>, store: Arc<TokenStore>) -> Self {
        Self {
            anon_key: anon_key.into(),
            stores: vec![store],
        }
    }

    /// Consult `store` after the ones already attached.
    pub fn with_store(mut self, store: Arc<TokenStore>) -> Self {
        self.stores.push(store);
        self
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn credential(&self) -> Credential {
        self.credential_at(Utc::now())
    }

    pub fn credential_at(&self, now: DateTime<Utc>) -> Credential {
        self.stores
            .iter()
            .filter_map(|store| store.read())
            .find(|session| session.is_valid_at(now))
            .map(|session| Credential::User(session.access_token.clone()))
            .unwrap_or(Credential::Anonymous)
    }

    /// Value of the `Authorization` header for a request sent now.
    pub fn bearer(&self) -> String {
        self.bearer_for(&self.credential())
    }

    fn bearer_for(&self, credential: &Credential) -> String {
        match credential {
            Credential::User(token) => format!("Bearer {token}"),
            Credential::Anonymous => format!("Bearer {}", self.anon_key),
        }
    }

    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let credential = self.credential();
        trace!(
            user = matches!(credential, Credential::User(_)),
            "Authorizing request"
        );
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer_for(&credential))
    }
}
