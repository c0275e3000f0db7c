//! Storage trait definitions.

use crate::StorageResult;

/// Trait for key/value storage backends
pub trait SecureStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Store several values as one unit.
    ///
    /// The default implementation writes entries one by one. Backends that can
    /// commit a batch atomically override this.
    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Delete several keys as one unit.
    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Write `set` and remove `delete` in a single commit.
    ///
    /// Either every change is applied or none is.
    fn replace_many(&self, set: &[(&str, &str)], delete: &[&str]) -> StorageResult<()>;
}
