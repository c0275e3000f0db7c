//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default backend URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://roominate.supabase.co",
};

/// Default anonymous API key (can be overridden at compile time via SUPABASE_ANON_KEY env var).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Connect/read/write budget applied to every backend call.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Resend cooldown on the signup verification step.
pub const DEFAULT_SIGNUP_OTP_COOLDOWN_SECS: u64 = 60;

/// Resend cooldown on the password-reset verification step.
pub const DEFAULT_RESET_OTP_COOLDOWN_SECS: u64 = 30;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Backend project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Anonymous API key (public, subject to row-level authorization).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// HTTP timeout in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// OTP resend cooldown for signup, in seconds.
    #[serde(default = "default_signup_otp_cooldown_secs")]
    pub signup_otp_cooldown_secs: u64,
    /// OTP resend cooldown for password reset, in seconds.
    #[serde(default = "default_reset_otp_cooldown_secs")]
    pub reset_otp_cooldown_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_signup_otp_cooldown_secs() -> u64 {
    DEFAULT_SIGNUP_OTP_COOLDOWN_SECS
}

fn default_reset_otp_cooldown_secs() -> u64 {
    DEFAULT_RESET_OTP_COOLDOWN_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            signup_otp_cooldown_secs: DEFAULT_SIGNUP_OTP_COOLDOWN_SECS,
            reset_otp_cooldown_secs: DEFAULT_RESET_OTP_COOLDOWN_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file under `paths`, falling back to
    /// defaults, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Some(log_level) = non_empty_env("ROOMINATE_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(url) = non_empty_env("ROOMINATE_SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Some(key) = non_empty_env("ROOMINATE_SUPABASE_ANON_KEY") {
            self.supabase_anon_key = key;
        }
    }

    fn validate(&self) -> CoreResult<()> {
        self.supabase_url()?;
        if self.supabase_anon_key.trim().is_empty() {
            return Err(CoreError::Config("anonymous API key is empty".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(CoreError::Config(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the backend URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// HTTP timeout as a duration.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn signup_otp_cooldown(&self) -> Duration {
        Duration::from_secs(self.signup_otp_cooldown_secs)
    }

    pub fn reset_otp_cooldown(&self) -> Duration {
        Duration::from_secs(self.reset_otp_cooldown_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
