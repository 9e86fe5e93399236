//! Storage seam for published registries.
//!
//! Building a registry is pure; where it lives afterwards is up to the
//! caller. A store accepts a finished registry and hands back shared,
//! read-only snapshots. Publishing never mutates a snapshot a reader already
//! holds.

use std::sync::Arc;

use crate::error::StorageError;
use crate::registry::Registry;

/// A place registries are published to and loaded from.
pub trait RegistryStore: Send + Sync {
    /// Publishes a registry, replacing whatever was published before.
    ///
    /// # Errors
    /// Backend-specific; the previously published registry stays intact on
    /// failure.
    fn publish(&self, registry: &Registry) -> Result<(), StorageError>;

    /// Loads the most recently published registry.
    ///
    /// # Errors
    /// [`StorageError::Missing`] if nothing has been published, or a
    /// backend-specific failure.
    fn load(&self) -> Result<Arc<Registry>, StorageError>;
}
