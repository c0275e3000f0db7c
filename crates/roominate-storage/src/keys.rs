//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    // Plaintext tier: ordinary session bookkeeping

    /// User access token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// User refresh token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Token type (normally "bearer")
    pub const TOKEN_TYPE: &'static str = "token_type";

    /// Absolute access token expiry (RFC 3339)
    pub const EXPIRES_AT: &'static str = "expires_at";

    // Encrypted tier: tokens from the OAuth redirect

    /// OAuth access token
    pub const OAUTH_ACCESS_TOKEN: &'static str = "supabase_access_token";

    /// OAuth refresh token
    pub const OAUTH_REFRESH_TOKEN: &'static str = "supabase_refresh_token";

    /// OAuth token type
    pub const OAUTH_TOKEN_TYPE: &'static str = "supabase_token_type";

    /// OAuth access token expiry (RFC 3339)
    pub const OAUTH_EXPIRES_AT: &'static str = "supabase_expires_at";

    // Preferences

    /// Raw profile JSON snapshot
    pub const USER_DATA: &'static str = "user_data";

    /// Resolved role of the signed-in user
    pub const USER_ROLE: &'static str = "user_role";

    /// Login form prefill
    pub const LAST_SIGNED_EMAIL: &'static str = "last_signed_email";

    /// OTP form prefill
    pub const LAST_OTP_EMAIL: &'static str = "last_otp_email";
}
