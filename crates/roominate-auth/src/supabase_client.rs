//! HTTP implementation of [`AuthBackend`] against the hosted auth, edge
//! function and REST endpoints.

use crate::backend::{AuthBackend, OtpPurpose};
use crate::types::{AuthResponse, NewProfile, OtpVerification, Profile, SignupRequest};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use roominate_config::Config;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, info, warn};
use url::Url;

pub(crate) fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Build the shared HTTP client with the configured connect and call budget.
pub fn build_http_client(config: &Config) -> AuthResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.http_timeout())
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| AuthError::Config(format!("failed to build HTTP client: {e}")))
}

/// Read a JSON body, mapping non-2xx answers to [`AuthError::Backend`].
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    fallback: &str,
) -> AuthResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        warn!(status = %status, body_summary = %summarize_response_body(&body), "{}", fallback);
        return Err(AuthError::from_response_body(status.as_u16(), &body, fallback));
    }
    serde_json::from_str(&body).map_err(|e| AuthError::Parse(format!("{fallback}: {e}")))
}

/// Like [`read_json`] for endpoints whose success body is ignored.
pub(crate) async fn ensure_success(response: reqwest::Response, fallback: &str) -> AuthResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body_summary = %summarize_response_body(&body), "{}", fallback);
    Err(AuthError::from_response_body(status.as_u16(), &body, fallback))
}

/// Edge function reply: `{success}` or `{error}` with a 200 status.
#[derive(Debug, Deserialize)]
struct FunctionReply {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

impl FunctionReply {
    fn rejection(&self, fallback: &str) -> Option<AuthError> {
        if let Some(message) = self.error.as_ref().filter(|m| !m.trim().is_empty()) {
            return Some(AuthError::Backend {
                status: 200,
                message: message.clone(),
            });
        }
        if self.success == Some(false) {
            return Some(AuthError::Backend {
                status: 200,
                message: fallback.to_string(),
            });
        }
        None
    }
}

/// Hosted backend client.
#[derive(Clone)]
pub struct SupabaseClient {
    http_client: reqwest::Client,
    base_url: Url,
    anon_key: String,
}

impl SupabaseClient {
    /// Create a client from configuration.
    pub fn new(config: &Config) -> AuthResult<Self> {
        let http_client = build_http_client(config)?;
        Self::with_http_client(http_client, config.supabase_url()?, &config.supabase_anon_key)
    }

    /// Create a client around an existing HTTP client.
    pub fn with_http_client(
        http_client: reqwest::Client,
        base_url: Url,
        anon_key: &str,
    ) -> AuthResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(AuthError::Config(format!("invalid backend URL: {base_url}")));
        }
        Ok(Self {
            http_client,
            base_url,
            anon_key: anon_key.to_string(),
        })
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` (e.g. `auth/v1/signup`) against the project URL.
    pub(crate) fn endpoint(&self, path: &str) -> AuthResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AuthError::Config(format!("invalid backend URL: {}", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn profiles_url(&self, user_id: &str) -> AuthResult<Url> {
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{user_id}"));
        Ok(url)
    }

    /// Request carrying the anonymous key in both headers.
    fn anon_request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    /// Request carrying the anonymous key as `apikey` and a user token as bearer.
    fn user_request(
        &self,
        method: reqwest::Method,
        url: Url,
        access_token: &str,
    ) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {access_token}"))
    }
}

#[async_trait]
impl AuthBackend for SupabaseClient {
    async fn sign_up(&self, request: &SignupRequest) -> AuthResult<AuthResponse> {
        let url = self.endpoint("auth/v1/signup")?;
        debug!(role = %request.data.role, "Creating account");

        let response = self
            .anon_request(reqwest::Method::POST, url)
            .json(request)
            .send()
            .await?;

        read_json(response, "Sign up failed").await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<AuthResponse> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .anon_request(reqwest::Method::POST, url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        read_json(response, "Sign in failed").await
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let url = self.endpoint("auth/v1/logout")?;
        let response = self
            .user_request(reqwest::Method::POST, url, access_token)
            .send()
            .await?;
        ensure_success(response, "Sign out failed").await
    }

    async fn send_otp(&self, purpose: OtpPurpose, email: &str) -> AuthResult<()> {
        match purpose {
            OtpPurpose::Signup => {
                let url = self.endpoint("functions/v1/send-otp")?;
                let response = self
                    .anon_request(reqwest::Method::POST, url)
                    .json(&serde_json::json!({ "email": email }))
                    .send()
                    .await?;
                let reply: FunctionReply = read_json(response, "Send OTP failed").await?;
                match reply.rejection("Send OTP failed") {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
            OtpPurpose::Recovery => {
                let url = self.endpoint("auth/v1/recover")?;
                let response = self
                    .anon_request(reqwest::Method::POST, url)
                    .json(&serde_json::json!({ "email": email }))
                    .send()
                    .await?;
                ensure_success(response, "Failed to send reset code").await
            }
        }
    }

    async fn verify_otp(
        &self,
        purpose: OtpPurpose,
        email: &str,
        code: &str,
    ) -> AuthResult<OtpVerification> {
        match purpose {
            OtpPurpose::Signup => {
                let url = self.endpoint("functions/v1/verify-otp")?;
                let response = self
                    .anon_request(reqwest::Method::POST, url)
                    .json(&serde_json::json!({ "email": email, "otp": code }))
                    .send()
                    .await?;
                let reply: FunctionReply = read_json(response, "Verify OTP failed").await?;
                if let Some(err) = reply.rejection("Verify OTP failed") {
                    return Err(err);
                }
                Ok(OtpVerification {
                    access_token: reply.access_token,
                    ..OtpVerification::default()
                })
            }
            OtpPurpose::Recovery => {
                let url = self.endpoint("auth/v1/verify")?;
                let response = self
                    .anon_request(reqwest::Method::POST, url)
                    .json(&serde_json::json!({
                        "email": email,
                        "token": code,
                        "type": "recovery",
                    }))
                    .send()
                    .await?;
                read_json(response, "Invalid or expired code").await
            }
        }
    }

    async fn update_password(&self, access_token: &str, new_password: &str) -> AuthResult<()> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .user_request(reqwest::Method::PUT, url, access_token)
            .json(&serde_json::json!({ "password": new_password }))
            .send()
            .await?;
        ensure_success(response, "Failed to update password").await?;
        info!("Password updated");
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str, access_token: &str) -> AuthResult<Option<Profile>> {
        let mut url = self.profiles_url(user_id)?;
        url.query_pairs_mut().append_pair("select", "*");

        let response = self
            .user_request(reqwest::Method::GET, url, access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let rows: Vec<Profile> = read_json(response, "Failed to fetch profile").await?;
        debug!(user_id = %user_id, rows = rows.len(), "Fetched profile");
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, profile: &NewProfile, access_token: &str) -> AuthResult<()> {
        let url = self.endpoint("rest/v1/profiles")?;
        let response = self
            .user_request(reqwest::Method::POST, url, access_token)
            .header("Prefer", "return=representation")
            .json(profile)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::CONFLICT {
            ensure_success(response, "Failed to create profile").await?;
            info!(user_id = %profile.id, "Profile created");
            return Ok(());
        }

        debug!(user_id = %profile.id, "Profile row exists; updating instead");
        let url = self.profiles_url(&profile.id)?;
        let response = self
            .user_request(reqwest::Method::PATCH, url, access_token)
            .header("Prefer", "return=representation")
            .json(profile)
            .send()
            .await?;
        ensure_success(response, "Failed to update profile").await?;
        info!(user_id = %profile.id, "Profile updated");
        Ok(())
    }
}
