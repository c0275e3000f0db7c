//! Device-local key/value storage for the Roominate client.
//!
//! This crate provides:
//! - The [`SecureStorage`] trait every backend implements
//! - [`MemoryStorage`] for tests and ephemeral sessions
//! - [`JsonFileStorage`], a plaintext preferences file with atomic batch writes
//! - [`EncryptedStorage`], a ChaCha20-Poly1305 wrapper for the at-rest-encrypted tier
//! - [`AppPrefs`] for the cached profile snapshot and login-form prefill

mod encrypted;
mod file;
mod keys;
mod memory;
mod prefs;
mod traits;

pub use encrypted::{EncryptedStorage, MASTER_KEY_SIZE};
pub use file::JsonFileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use prefs::AppPrefs;
pub use traits::SecureStorage;

use roominate_config::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Encryption or decryption failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Stored data is not in the expected shape
    #[error("Corrupt storage file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Open the plaintext preferences tier under `paths`.
pub fn open_plain_storage(paths: &Paths) -> StorageResult<JsonFileStorage> {
    std::fs::create_dir_all(paths.base_dir())?;
    JsonFileStorage::open(paths.prefs_file())
}

/// Open the encrypted preferences tier under `paths`, creating its master
/// key on first use.
pub fn open_encrypted_storage(paths: &Paths) -> StorageResult<EncryptedStorage<JsonFileStorage>> {
    std::fs::create_dir_all(paths.base_dir())?;
    let master_key = encrypted::load_or_create_master_key(&paths.secure_prefs_key_file())?;
    let inner = JsonFileStorage::open(paths.secure_prefs_file())?;
    EncryptedStorage::new(inner, &master_key)
}
