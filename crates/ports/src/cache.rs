//! Persisted key-value store for configuration documents.

use polychat_shared::Result;

/// Keyed store of opaque text blobs.
///
/// The loader reads it synchronously on the startup path, so the contract is
/// blocking. Writes replace the whole value; a read after a write in the same
/// process observes the new value.
pub trait ConfigCachePort: Send + Sync {
    /// Read a value, `None` when absent.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace a value.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Absent keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
