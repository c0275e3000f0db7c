//! File system paths for the client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Plaintext preferences file (ordinary session bookkeeping).
const PREFS_FILE_NAME: &str = "prefs.json";
/// Encrypted preferences file (tokens obtained through an OAuth redirect).
const SECURE_PREFS_FILE_NAME: &str = "secure_prefs.json";
/// Master secret for the encrypted preferences file.
const SECURE_PREFS_KEY_FILE_NAME: &str = "secure_prefs.key";

/// Manages file system paths for the client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client state (~/.roominate)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.roominate`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".roominate"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.roominate).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.roominate/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the plaintext preferences path (~/.roominate/prefs.json).
    pub fn prefs_file(&self) -> PathBuf {
        self.base_dir.join(PREFS_FILE_NAME)
    }

    /// Get the encrypted preferences path (~/.roominate/secure_prefs.json).
    pub fn secure_prefs_file(&self) -> PathBuf {
        self.base_dir.join(SECURE_PREFS_FILE_NAME)
    }

    /// Get the encrypted preferences master key path (~/.roominate/secure_prefs.key).
    pub fn secure_prefs_key_file(&self) -> PathBuf {
        self.base_dir.join(SECURE_PREFS_KEY_FILE_NAME)
    }

    /// Get the logs directory (~/.roominate/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
