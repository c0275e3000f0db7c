//! Core types, configuration, and utilities for the Roominate client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOG_LEVEL, DEFAULT_RESET_OTP_COOLDOWN_SECS,
    DEFAULT_SIGNUP_OTP_COOLDOWN_SECS, DEFAULT_SUPABASE_ANON_KEY, DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
