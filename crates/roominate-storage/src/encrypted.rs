//! At-rest encryption wrapper for any storage backend.
//!
//! Values are sealed with ChaCha20-Poly1305 under a key derived (HKDF-SHA256)
//! from a per-device master secret. Each stored value is the base64 encoding
//! of `nonce || ciphertext`. Entry names stay in clear and are bound to the
//! ciphertext as associated data, so a value copied under another name fails
//! to open.

use crate::{SecureStorage, StorageError, StorageResult};
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::path::Path;
use tracing::debug;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Size of the per-device master secret.
pub const MASTER_KEY_SIZE: usize = 32;

const NONCE_SIZE: usize = 12;
const KEY_DERIVATION_INFO: &[u8] = b"roominate-secure-prefs-v1";

/// Storage decorator that encrypts every value before handing it to `S`.
pub struct EncryptedStorage<S> {
    inner: S,
    cipher: ChaCha20Poly1305,
}

impl<S: SecureStorage> EncryptedStorage<S> {
    /// Wrap `inner`, deriving the value key from `master_key`.
    pub fn new(inner: S, master_key: &[u8]) -> StorageResult<Self> {
        if master_key.len() != MASTER_KEY_SIZE {
            return Err(StorageError::Crypto(format!(
                "invalid master key length: expected {}, got {}",
                MASTER_KEY_SIZE,
                master_key.len()
            )));
        }

        let hkdf = Hkdf::<Sha256>::new(None, master_key);
        let mut okm = [0u8; 32];
        hkdf.expand(KEY_DERIVATION_INFO, &mut okm)
            .map_err(|e| StorageError::Crypto(format!("HKDF expand failed: {:?}", e)))?;

        let cipher = ChaCha20Poly1305::new_from_slice(&okm)
            .map_err(|e| StorageError::Crypto(e.to_string()))?;

        Ok(Self { inner, cipher })
    }

    /// Access the wrapped backend. Values read through it are still sealed.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn seal(&self, key: &str, value: &str) -> StorageResult<String> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: value.as_bytes(),
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| StorageError::Crypto(format!("encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    fn open(&self, key: &str, sealed: &str) -> StorageResult<String> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| StorageError::Encoding(format!("base64 decode failed: {}", e)))?;

        if bytes.len() < NONCE_SIZE {
            return Err(StorageError::Crypto(format!(
                "sealed value too short: {} bytes",
                bytes.len()
            )));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| StorageError::Crypto(format!("decryption failed: {}", e)))?;

        String::from_utf8(plaintext).map_err(|e| StorageError::Encoding(e.to_string()))
    }
}

impl<S: SecureStorage> SecureStorage for EncryptedStorage<S> {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let sealed = self.seal(key, value)?;
        self.inner.set(key, &sealed)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.inner.get(key)? {
            Some(sealed) => self.open(key, &sealed).map(Some),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(key)
    }

    fn has(&self, key: &str) -> StorageResult<bool> {
        self.inner.has(key)
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        let mut sealed = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            sealed.push((*key, self.seal(key, value)?));
        }
        let borrowed: Vec<(&str, &str)> = sealed
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        self.inner.set_many(&borrowed)
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        self.inner.delete_many(keys)
    }

    fn replace_many(&self, set: &[(&str, &str)], delete: &[&str]) -> StorageResult<()> {
        let mut sealed = Vec::with_capacity(set.len());
        for (key, value) in set {
            sealed.push((*key, self.seal(key, value)?));
        }
        let borrowed: Vec<(&str, &str)> = sealed
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        self.inner.replace_many(&borrowed, delete)
    }
}

/// Read the master secret at `path`, generating and persisting a fresh one
/// (owner read/write only) if the file does not exist.
pub(crate) fn load_or_create_master_key(path: &Path) -> StorageResult<[u8; MASTER_KEY_SIZE]> {
    if path.exists() {
        let encoded = std::fs::read_to_string(path)?;
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| StorageError::Encoding(format!("master key decode failed: {}", e)))?;
        let key: [u8; MASTER_KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            StorageError::Crypto(format!(
                "invalid master key length: expected {}, got {}",
                MASTER_KEY_SIZE,
                bytes.len()
            ))
        })?;
        return Ok(key);
    }

    let mut key = [0u8; MASTER_KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    write_private_file(path, BASE64.encode(key).as_bytes())?;
    debug!(path = %path.display(), "Generated encrypted preferences master key");
    Ok(key)
}

#[cfg(unix)]
fn write_private_file(path: &Path, content: &[u8]) -> StorageResult<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, content: &[u8]) -> StorageResult<()> {
    tracing::warn!(path = %path.display(), "File permissions not restricted on this platform");
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use tempfile::tempdir;

    fn storage() -> EncryptedStorage<MemoryStorage> {
        EncryptedStorage::new(MemoryStorage::new(), &[7u8; MASTER_KEY_SIZE]).unwrap()
    }

    #[test]
    fn test_values_are_sealed_in_backend() {
        let storage = storage();
        storage.set("supabase_access_token", "eyJ.secret").unwrap();

        let raw = storage.inner().get("supabase_access_token").unwrap().unwrap();
        assert!(!raw.contains("eyJ.secret"));
        assert_eq!(
            storage.get("supabase_access_token").unwrap(),
            Some("eyJ.secret".to_string())
        );
    }

    #[test]
    fn test_same_value_seals_differently() {
        let storage = storage();
        storage.set_many(&[("a", "same"), ("b", "same")]).unwrap();

        let a = storage.inner().get("a").unwrap().unwrap();
        let b = storage.inner().get("b").unwrap().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_replace_many_seals_and_deletes() {
        let storage = storage();
        storage
            .set_many(&[("supabase_access_token", "old"), ("supabase_token_type", "bearer")])
            .unwrap();

        storage
            .replace_many(&[("supabase_access_token", "new")], &["supabase_token_type"])
            .unwrap();

        let raw = storage.inner().get("supabase_access_token").unwrap().unwrap();
        assert_ne!(raw, "new");
        assert_eq!(
            storage.get("supabase_access_token").unwrap(),
            Some("new".to_string())
        );
        assert!(!storage.inner().has("supabase_token_type").unwrap());
    }

    #[test]
    fn test_value_moved_to_other_name_fails_to_open() {
        let storage = storage();
        storage.set("supabase_access_token", "tok").unwrap();

        let raw = storage.inner().get("supabase_access_token").unwrap().unwrap();
        storage.inner().set("supabase_refresh_token", &raw).unwrap();

        assert!(matches!(
            storage.get("supabase_refresh_token"),
            Err(StorageError::Crypto(_))
        ));
    }

    #[test]
    fn test_wrong_master_key_fails_to_open() {
        let storage = storage();
        storage.set("k", "v").unwrap();
        let raw = storage.inner().get("k").unwrap().unwrap();

        let other = EncryptedStorage::new(MemoryStorage::new(), &[8u8; MASTER_KEY_SIZE]).unwrap();
        other.inner().set("k", &raw).unwrap();
        assert!(other.get("k").is_err());
    }

    #[test]
    fn test_rejects_short_master_key() {
        let result = EncryptedStorage::new(MemoryStorage::new(), &[1u8; 16]);
        assert!(matches!(result, Err(StorageError::Crypto(_))));
    }

    #[test]
    fn test_missing_value_reads_none() {
        let storage = storage();
        assert_eq!(storage.get("absent").unwrap(), None);
        assert!(!storage.has("absent").unwrap());
    }

    #[test]
    fn test_master_key_created_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secure_prefs.key");

        let first = load_or_create_master_key(&path).unwrap();
        let second = load_or_create_master_key(&path).unwrap();
        assert_eq!(first, second);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
