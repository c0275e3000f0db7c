//! Authentication error types.

use roominate_storage::StorageError;
use thiserror::Error;

/// Authentication error type.
///
/// Every fallible operation in this crate returns one of these; nothing is
/// allowed to panic across an await point.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No response was received (connect failure, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a rejection.
    #[error("Backend rejected request (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Local input validation failed before any backend call.
    #[error("{0}")]
    Validation(String),

    /// Invalid state transition in a flow controller or the session FSM
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// OTP resend attempted inside the cooldown window
    #[error("Please wait {remaining_secs}s before requesting a new code")]
    CooldownActive { remaining_secs: u64 },

    /// Session not found
    #[error("Not logged in")]
    NotLoggedIn,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A blocking storage task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),
}

impl AuthError {
    /// Short text suitable for a transient user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Network(_) => "Network error. Please check your connection.".to_string(),
            AuthError::Backend { message, .. } => message.clone(),
            AuthError::Parse(_) => "Failed to parse response".to_string(),
            other => other.to_string(),
        }
    }

    /// Returns true when the backend refused an account creation because the
    /// email is already registered.
    pub fn is_user_already_exists(&self) -> bool {
        match self {
            AuthError::Backend { message, .. } => {
                let lowered = message.to_lowercase();
                lowered.contains("user_already_exists")
                    || lowered.contains("already exists")
                    || lowered.contains("user already")
            }
            _ => false,
        }
    }

    /// Build a backend rejection from a raw error body.
    pub(crate) fn from_response_body(status: u16, body: &str, fallback: &str) -> Self {
        let message = extract_backend_message(body).unwrap_or_else(|| fallback.to_string());
        AuthError::Backend { status, message }
    }
}

/// Pull the human-readable message out of a structured error body.
///
/// Fields are tried in order: `msg`, `error`, `error_description`, `message`.
pub(crate) fn extract_backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["msg", "error", "error_description", "message"]
        .iter()
        .filter_map(|field| value.get(*field).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(str::to_string)
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Parse(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Parse(err.to_string())
    }
}

impl From<roominate_config::CoreError> for AuthError {
    fn from(err: roominate_config::CoreError) -> Self {
        AuthError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Task(err.to_string())
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
