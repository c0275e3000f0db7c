//! The seam between the flow controllers and the hosted backend.

use crate::types::{AuthResponse, NewProfile, OtpVerification, Profile, SignupRequest};
use crate::AuthResult;
use async_trait::async_trait;

/// What an emailed one-time code is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtpPurpose {
    /// Prove control of the email before an account is created.
    Signup,
    /// Prove control of the email before a password change.
    Recovery,
}

/// Backend operations used by the session and flow controllers.
///
/// [`SupabaseClient`](crate::SupabaseClient) is the production
/// implementation; tests script their own.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Create an account.
    async fn sign_up(&self, request: &SignupRequest) -> AuthResult<AuthResponse>;

    /// Exchange email and password for a session.
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> AuthResult<AuthResponse>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;

    /// Email a six-digit code.
    async fn send_otp(&self, purpose: OtpPurpose, email: &str) -> AuthResult<()>;

    /// Check a code. A rejected code is an `Err`.
    async fn verify_otp(
        &self,
        purpose: OtpPurpose,
        email: &str,
        code: &str,
    ) -> AuthResult<OtpVerification>;

    /// Set a new password on the account behind `access_token`.
    async fn update_password(&self, access_token: &str, new_password: &str) -> AuthResult<()>;

    /// Fetch the profile row for `user_id`; `Ok(None)` if there is none.
    async fn fetch_profile(&self, user_id: &str, access_token: &str)
        -> AuthResult<Option<Profile>>;

    /// Insert the profile row, updating it instead if it already exists.
    async fn upsert_profile(&self, profile: &NewProfile, access_token: &str) -> AuthResult<()>;
}
