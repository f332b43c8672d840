//! Abstract storage trait for archived events.
//!
//! The contract is deliberately narrow: opaque bytes under a string key
//! with an optional retention hint. The bus only ever calls `save`; `load`
//! and `delete` exist for replay tooling built on top of the archive.

use std::time::Duration;

use crate::error::StorageError;

/// Storage backend for archived events.
///
/// Implementations must be safe for concurrent use; the archive worker and
/// replay tooling may call in from different threads.
pub trait EventStore: Send + Sync {
    /// Persist `payload` under `key`.
    ///
    /// `retention` is a hint: backends that support expiry should drop the
    /// record once the duration elapses, others may ignore it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` on backend failure.
    fn save(&self, key: &str, payload: &[u8], retention: Option<Duration>)
        -> Result<(), StorageError>;

    /// Fetch the record under `key`, if present and not expired.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` on backend failure.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove the record under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::KeyNotFound` if the key is absent.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_event_store_object_safe(_: &dyn EventStore) {}
}
