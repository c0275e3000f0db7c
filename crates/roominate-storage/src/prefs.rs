//! Non-secret application preferences: cached profile and form prefill.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use serde_json::Value;
use std::sync::Arc;

/// High-level API over the plaintext preferences tier.
#[derive(Clone)]
pub struct AppPrefs {
    storage: Arc<dyn SecureStorage>,
}

impl AppPrefs {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Cache the signed-in user's profile row and resolved role.
    pub fn set_user_data(&self, profile: &Value, role: &str) -> StorageResult<()> {
        let json =
            serde_json::to_string(profile).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set_many(&[
            (StorageKeys::USER_DATA, json.as_str()),
            (StorageKeys::USER_ROLE, role),
        ])
    }

    /// Cached profile row, if any.
    pub fn get_user_data(&self) -> StorageResult<Option<Value>> {
        match self.storage.get(StorageKeys::USER_DATA)? {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn get_user_role(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::USER_ROLE)
    }

    pub fn clear_user_data(&self) -> StorageResult<()> {
        self.storage
            .delete_many(&[StorageKeys::USER_DATA, StorageKeys::USER_ROLE])
    }

    pub fn set_last_signed_email(&self, email: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::LAST_SIGNED_EMAIL, email)
    }

    pub fn get_last_signed_email(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::LAST_SIGNED_EMAIL)
    }

    pub fn set_last_otp_email(&self, email: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::LAST_OTP_EMAIL, email)
    }

    pub fn get_last_otp_email(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::LAST_OTP_EMAIL)
    }
}
