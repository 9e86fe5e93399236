//! In-memory registry store.
//!
//! Thread-safe, for embedded usage and tests. Publishing swaps the shared
//! snapshot; readers holding the previous `Arc` keep it.

use std::sync::{Arc, RwLock};

use crate::error::StorageError;
use crate::registry::Registry;
use crate::storage::traits::RegistryStore;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// In-memory [`RegistryStore`].
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    current: RwLock<Option<Arc<Registry>>>,
}

impl InMemoryRegistryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for InMemoryRegistryStore {
    fn publish(&self, registry: &Registry) -> Result<(), StorageError> {
        let snapshot = Arc::new(registry.clone());
        let mut current = self.current.write().map_err(|_| lock_err("publish"))?;
        *current = Some(snapshot);
        Ok(())
    }

    fn load(&self) -> Result<Arc<Registry>, StorageError> {
        let current = self.current.read().map_err(|_| lock_err("load"))?;
        current.as_ref().map(Arc::clone).ok_or_else(|| StorageError::Missing {
            location: "memory".to_string(),
        })
    }
}
