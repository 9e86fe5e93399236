//! # player-registry
//!
//! Assigns stable canonical ids to player names that are written
//! inconsistently across data sources: swapped given/family order, case,
//! diacritics, stray commas, or Chinese characters instead of their
//! romanization.
//!
//! ## Core Concepts
//!
//! - **Normalization**: raw name → lowercase, accent-free, romanized tokens
//! - **Blocking key**: one permutation of a name's tokens, concatenated
//! - **Cluster**: connected component of names that share any blocking key
//! - **Registry**: immutable blocking key → canonical id map
//! - **Resolver**: raw name → canonical id (or unmapped) against a registry
//!
//! ## Usage
//!
//! ```rust
//! use player_registry::{ClusterBuilder, Resolver};
//!
//! let registry = ClusterBuilder::new()
//!     .build(&["Magnus Carlsen", "Carlsen, Magnus", "李雷"])?
//!     .into_shared();
//!
//! let resolver = Resolver::new(registry);
//! assert_eq!(resolver.resolve("CARLSEN Magnus").map(|id| id.to_string()), Some("player_0".into()));
//! assert_eq!(resolver.resolve("Lei Li").map(|id| id.to_string()), Some("player_1".into()));
//! assert!(resolver.resolve("Hikaru Nakamura").is_none());
//! # Ok::<(), player_registry::RegistryError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Identity and normalization
pub mod error;
pub mod identity;
pub mod keys;
pub mod normalize;

// Build, registry, and lookup
pub mod cluster;
pub mod registry;
pub mod resolve;
pub mod storage;

pub use cluster::{build, BuildConfig, BuildReport, BuildStats, Cluster, ClusterBuilder};
pub use error::{BuildError, RegistryError, RegistryResult, StorageError, ValidationError};
pub use identity::{BlockingKey, CanonicalId, CANONICAL_ID_PREFIX};
pub use keys::{generate_keys, KeyGenerator, KeySet, DEFAULT_MAX_TOKENS, MAX_TOKENS_LIMIT};
pub use normalize::{clean_name, normalize, TokenSequence};
pub use registry::{Registry, RegistryStats};
pub use resolve::{resolve, Resolution, Resolver};
pub use storage::{InMemoryRegistryStore, RegistryStore};

#[cfg(feature = "persistent")]
pub use storage::{load_registry, save_registry, FileRegistryStore, RegistryHeader, StoreConfig};
