//! Session and authenticated-request management for the Roominate client.
//!
//! This crate provides:
//! - [`TokenStore`]: the single reader/writer of session tokens, in a plaintext
//!   or an at-rest-encrypted tier
//! - [`RequestAuthorizer`]: attaches the user token or the anonymous key to
//!   every outgoing backend request
//! - [`SignupController`] and [`PasswordResetController`]: the OTP-driven
//!   multi-step flows, built on a shared [`OtpChallenge`]
//! - [`SessionManager`]: sign-in, sign-out, restore and OAuth callback handling
//!   tracked by an explicit state machine
//! - [`SupabaseClient`] and [`RestClient`]: the HTTP side of the backend

mod authorizer;
mod backend;
mod error;
mod oauth;
mod otp;
mod password_reset;
mod rest;
mod session;
mod session_fsm;
mod signup;
mod supabase_client;
mod token_store;
mod types;
mod validation;

pub use authorizer::{Credential, RequestAuthorizer};
pub use backend::{AuthBackend, OtpPurpose};
pub use error::{AuthError, AuthResult};
pub use oauth::{parse_callback, OAuthCallback};
pub use otp::OtpChallenge;
pub use password_reset::{PasswordResetController, ResetProgress, ResetStage};
pub use rest::{RestClient, Table};
pub use session::{SessionManager, SessionStateCallback, SessionStatus, SignInOutcome};
pub use session_fsm::{SessionMachine, SessionMachineInput, SessionMachineState, SessionState};
pub use signup::{
    Applicant, Password, SignupController, SignupOutcome, SignupProgress, SignupStage,
};
pub use supabase_client::{build_http_client, SupabaseClient};
pub use token_store::{Session, TokenStore, TokenTier};
pub use types::{
    AuthResponse, AuthUser, NewProfile, OtpVerification, Profile, Role, SessionTokens,
    SignupMetadata, SignupRequest,
};
pub use validation::{
    is_valid_email, password_strength, validate_dob, validate_email, validate_name,
    validate_otp_code, validate_phone, PasswordPolicy, PasswordStrength, StrengthLevel,
};
