//! Typed request and response records for the backend API.
//!
//! Unknown fields are ignored; missing optional fields deserialize to `None`.

use crate::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Marketplace role, used for dashboard routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Tenant,
    Owner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Tenant => "tenant",
            Role::Owner => "owner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tenant" => Ok(Role::Tenant),
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            other => Err(AuthError::Validation(format!("Unknown role: {other}"))),
        }
    }
}

/// `user_metadata` sent with account creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupMetadata {
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body of `POST /auth/v1/signup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub data: SignupMetadata,
}

/// Auth user object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    /// Role recorded in the user's metadata at signup, if any.
    pub fn metadata_role(&self) -> Option<Role> {
        self.user_metadata
            .get("role")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
    }
}

/// Token bundle nested under `session` in some auth responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Response of the signup and password grant endpoints.
///
/// Tokens may sit at the top level, under `session`, or be absent when the
/// backend still expects an email confirmation. With confirmation pending the
/// user object itself is returned, so its `id` shows up at the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub user: Option<AuthUser>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub session: Option<SessionTokens>,
}

impl AuthResponse {
    pub fn user_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|user| user.id.as_str())
            .or(self.id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Tokens carried by the response, top-level first, then `session`.
    pub fn tokens(&self) -> Option<SessionTokens> {
        if let Some(access_token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Some(SessionTokens {
                access_token: access_token.clone(),
                refresh_token: self.refresh_token.clone(),
                token_type: self.token_type.clone(),
                expires_in: self.expires_in,
            });
        }
        self.session
            .as_ref()
            .filter(|session| !session.access_token.is_empty())
            .cloned()
    }
}

/// Response of an OTP verification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OtpVerification {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// A `profiles` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Profile {
    /// Placeholder used when the user has no profile row yet.
    pub fn fallback(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            role: Some(Role::Tenant.to_string()),
            ..Self::default()
        }
    }

    /// Parsed role, if the row carries a recognised one.
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|raw| raw.parse().ok())
    }

    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = self.full_name.as_ref().filter(|n| !n.trim().is_empty()) {
            return Some(full.clone());
        }
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.to_string()),
            (None, Some(last)) => Some(last.to_string()),
            (None, None) => None,
        }
    }
}

/// Body of a profile insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
}
