//! Registry storage.
//!
//! [`RegistryStore`] is the seam between a finished build and whoever serves
//! lookups. [`InMemoryRegistryStore`] keeps the snapshot in process; with the
//! `persistent` feature, [`persistent::FileRegistryStore`] writes a
//! checksummed file atomically.

mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryRegistryStore;
pub use traits::RegistryStore;

#[cfg(feature = "persistent")]
pub use persistent::{load_registry, save_registry, FileRegistryStore, RegistryHeader, StoreConfig};
