//! Parsing of the OAuth redirect that carries tokens back to the app.

use crate::{AuthError, AuthResult};
use url::Url;

/// Tokens carried by an OAuth redirect.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCallback {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for OAuthCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCallback")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Parse a redirect given as a full URL (`roominate://auth/callback#...`),
/// a bare fragment (`#access_token=...`) or a bare query string.
///
/// Parameters are read from the fragment first, then from the query.
pub fn parse_callback(input: &str) -> AuthResult<OAuthCallback> {
    let input = input.trim();
    let params = match Url::parse(input) {
        Ok(url) => url
            .fragment()
            .filter(|f| !f.is_empty())
            .or(url.query())
            .unwrap_or_default()
            .to_string(),
        Err(_) => input.trim_start_matches(['#', '?']).to_string(),
    };

    let mut access_token = None;
    let mut refresh_token = None;
    let mut token_type = None;
    let mut expires_in = None;
    let mut error = None;

    for (key, value) in url::form_urlencoded::parse(params.as_bytes()) {
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "access_token" => access_token = Some(value),
            "refresh_token" => refresh_token = Some(value),
            "token_type" => token_type = Some(value),
            "expires_in" => match value.parse::<u64>() {
                Ok(secs) => expires_in = Some(secs),
                Err(_) => tracing::warn!("Ignoring unreadable expires_in in OAuth callback"),
            },
            "error_description" => error = Some(value),
            "error" if error.is_none() => error = Some(value),
            _ => {}
        }
    }

    if let Some(message) = error {
        return Err(AuthError::Backend {
            status: 0,
            message,
        });
    }

    let access_token = access_token.ok_or_else(|| {
        AuthError::Validation("Authentication callback did not contain an access token".to_string())
    })?;

    Ok(OAuthCallback {
        access_token,
        refresh_token,
        token_type,
        expires_in,
    })
}
