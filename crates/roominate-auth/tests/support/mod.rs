//! Scripted in-process backend shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use roominate_auth::{
    AuthBackend, AuthError, AuthResponse, AuthResult, AuthUser, NewProfile, OtpPurpose,
    OtpVerification, Profile, SignupRequest, TokenStore, TokenTier,
};
use roominate_storage::MemoryStorage;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

pub const CORRECT_CODE: &str = "123456";
pub const RECOVERY_TOKEN: &str = "recovery-token";

/// Each queue is consumed one entry per call; an empty queue falls back to a
/// successful default answer.
#[derive(Default)]
pub struct ScriptedBackend {
    pub sign_up: Mutex<VecDeque<AuthResult<AuthResponse>>>,
    pub sign_in: Mutex<VecDeque<AuthResult<AuthResponse>>>,
    pub send_otp: Mutex<VecDeque<AuthResult<()>>>,
    pub fetch_profile: Mutex<VecDeque<AuthResult<Option<Profile>>>>,
    pub upsert_profile: Mutex<VecDeque<AuthResult<()>>>,
    pub sign_out: Mutex<VecDeque<AuthResult<()>>>,
    /// When set, sign-in waits for a notification before answering.
    pub sign_in_gate: Mutex<Option<Arc<Notify>>>,
    pub fetch_profile_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    pub upserted_profiles: Mutex<Vec<(NewProfile, String)>>,
    pub password_updates: Mutex<Vec<(String, String)>>,
    pub signup_requests: Mutex<Vec<SignupRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }
}

pub fn auth_response(user_id: &str, access_token: &str, role: Option<&str>) -> AuthResponse {
    let metadata = match role {
        Some(role) => json!({ "role": role }),
        None => json!({}),
    };
    AuthResponse {
        user: Some(AuthUser {
            id: user_id.to_string(),
            email: Some("a@b.com".to_string()),
            user_metadata: metadata,
        }),
        access_token: Some(access_token.to_string()),
        refresh_token: Some(format!("{access_token}-refresh")),
        token_type: Some("bearer".to_string()),
        expires_in: Some(3600),
        ..AuthResponse::default()
    }
}

/// Account created but email confirmation still pending: no tokens.
pub fn pending_confirmation(user_id: &str) -> AuthResponse {
    AuthResponse {
        id: Some(user_id.to_string()),
        ..AuthResponse::default()
    }
}

pub fn rejected(status: u16, message: &str) -> AuthError {
    AuthError::Backend {
        status,
        message: message.to_string(),
    }
}

pub fn memory_store(tier: TokenTier) -> Arc<TokenStore> {
    Arc::new(TokenStore::open(Arc::new(MemoryStorage::new()), tier).unwrap())
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn sign_up(&self, request: &SignupRequest) -> AuthResult<AuthResponse> {
        self.record("sign_up");
        self.signup_requests.lock().push(request.clone());
        let scripted = self.sign_up.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(auth_response("user-1", "signup-token", None)))
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> AuthResult<AuthResponse> {
        self.record("sign_in");
        let gate = self.sign_in_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let scripted = self.sign_in.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(auth_response("user-1", "signin-token", None)))
    }

    async fn sign_out(&self, _access_token: &str) -> AuthResult<()> {
        self.record("sign_out");
        self.sign_out.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn send_otp(&self, purpose: OtpPurpose, _email: &str) -> AuthResult<()> {
        self.record(match purpose {
            OtpPurpose::Signup => "send_otp",
            OtpPurpose::Recovery => "send_recovery",
        });
        self.send_otp.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn verify_otp(
        &self,
        purpose: OtpPurpose,
        _email: &str,
        code: &str,
    ) -> AuthResult<OtpVerification> {
        self.record(match purpose {
            OtpPurpose::Signup => "verify_otp",
            OtpPurpose::Recovery => "verify_recovery",
        });
        if code != CORRECT_CODE {
            return Err(rejected(400, "Invalid OTP"));
        }
        Ok(OtpVerification {
            access_token: match purpose {
                OtpPurpose::Signup => None,
                OtpPurpose::Recovery => Some(RECOVERY_TOKEN.to_string()),
            },
            ..OtpVerification::default()
        })
    }

    async fn update_password(&self, access_token: &str, new_password: &str) -> AuthResult<()> {
        self.record("update_password");
        self.password_updates
            .lock()
            .push((access_token.to_string(), new_password.to_string()));
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str, _access_token: &str) -> AuthResult<Option<Profile>> {
        self.record("fetch_profile");
        let gate = self.fetch_profile_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let scripted = self.fetch_profile.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(Some(Profile {
                id: user_id.to_string(),
                role: Some("tenant".to_string()),
                ..Profile::default()
            }))
        })
    }

    async fn upsert_profile(&self, profile: &NewProfile, access_token: &str) -> AuthResult<()> {
        self.record("upsert_profile");
        self.upserted_profiles
            .lock()
            .push((profile.clone(), access_token.to_string()));
        self.upsert_profile.lock().pop_front().unwrap_or(Ok(()))
    }
}
