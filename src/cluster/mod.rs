//! Batch clustering of raw names into canonical players.
//!
//! # Architecture
//!
//! ```text
//! raw names ──► ShardPool (normalize + keys, parallel, order-preserving)
//!                   │
//!                   ▼
//!            UnionFind merge (single thread, key → first holder)
//!                   │
//!                   ▼
//!            ids by first appearance ──► Registry (key → id, conflict-checked)
//! ```

mod builder;
mod shard;
pub mod union_find;

pub use builder::{build, ClusterBuilder};
pub use union_find::UnionFind;

use std::fmt;

use crate::error::ValidationError;
use crate::identity::CanonicalId;
use crate::keys::{DEFAULT_MAX_TOKENS, MAX_TOKENS_LIMIT};
use crate::registry::Registry;

/// Configuration for a cluster build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Token cap for blocking-key generation.
    pub max_tokens: usize,
    /// Key-generation workers. `1` runs inline on the calling thread.
    pub workers: usize,
    /// Names per shard handed to a worker.
    pub shard_size: usize,
    /// Maximum queued shards.
    pub queue_capacity: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            workers: 1,
            shard_size: 4096,
            queue_capacity: 64,
        }
    }
}

impl BuildConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] for an out-of-range token cap or a zero
    /// worker count, shard size, or queue capacity.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !(1..=MAX_TOKENS_LIMIT).contains(&self.max_tokens) {
            return Err(ValidationError::TokenCapOutOfRange {
                value: self.max_tokens,
                min: 1,
                max: MAX_TOKENS_LIMIT,
            });
        }
        for (field, actual) in [
            ("workers", self.workers),
            ("shard_size", self.shard_size),
            ("queue_capacity", self.queue_capacity),
        ] {
            if actual < 1 {
                return Err(ValidationError::BelowMinimum {
                    field: field.to_string(),
                    min: 1,
                    actual,
                });
            }
        }
        Ok(self)
    }
}

/// One connected component of the name/key graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Canonical id of the cluster.
    pub id: CanonicalId,
    /// Distinct raw names in first-seen order.
    pub members: Vec<String>,
}

/// Counters from a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Raw names in the corpus, duplicates included.
    pub names: usize,
    /// Distinct raw names.
    pub distinct_names: usize,
    /// Names that normalized to zero tokens and were left out.
    pub skipped: usize,
    /// Names whose tokens were cut by the token cap.
    pub truncated: usize,
    /// Keys in the registry.
    pub keys: usize,
    /// Clusters, i.e. canonical ids assigned.
    pub clusters: usize,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Build statistics:")?;
        writeln!(f, "  Names: {} ({} distinct)", self.names, self.distinct_names)?;
        writeln!(f, "  Skipped (no tokens): {}", self.skipped)?;
        writeln!(f, "  Truncated (token cap): {}", self.truncated)?;
        writeln!(f, "  Keys: {}", self.keys)?;
        write!(f, "  Clusters: {}", self.clusters)
    }
}

/// Full output of a build: the registry plus what it was derived from.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// The frozen registry.
    pub registry: Registry,
    /// Clusters ordered by canonical id.
    pub clusters: Vec<Cluster>,
    /// Build counters.
    pub stats: BuildStats,
    assignments: Vec<(String, CanonicalId)>,
}

impl BuildReport {
    /// Discards everything but the registry.
    #[must_use]
    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Cluster for an id, if assigned.
    #[must_use]
    pub fn cluster(&self, id: CanonicalId) -> Option<&Cluster> {
        self.clusters.get(id.as_usize())
    }

    /// Canonical id of every distinct raw name in the corpus, first-seen order.
    ///
    /// Names skipped for having no tokens are absent.
    #[must_use]
    pub fn name_mapping(&self) -> &[(String, CanonicalId)] {
        &self.assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_token_cap() {
        let err = BuildConfig { max_tokens: 0, ..BuildConfig::default() }.validate().unwrap_err();
        assert!(matches!(err, ValidationError::TokenCapOutOfRange { value: 0, .. }));

        let err = BuildConfig { max_tokens: 9, ..BuildConfig::default() }.validate().unwrap_err();
        assert!(matches!(err, ValidationError::TokenCapOutOfRange { value: 9, .. }));
    }

    #[test]
    fn test_config_rejects_zero_sizes() {
        let err = BuildConfig { shard_size: 0, ..BuildConfig::default() }.validate().unwrap_err();
        let ValidationError::BelowMinimum { field, .. } = err else {
            panic!("expected BelowMinimum, got {err:?}");
        };
        assert_eq!(field, "shard_size");

        assert!(BuildConfig { workers: 0, ..BuildConfig::default() }.validate().is_err());
        assert!(BuildConfig { queue_capacity: 0, ..BuildConfig::default() }.validate().is_err());
    }

    #[test]
    fn test_stats_display() {
        let stats = BuildStats {
            names: 5,
            distinct_names: 4,
            skipped: 1,
            truncated: 0,
            keys: 6,
            clusters: 2,
        };
        let text = stats.to_string();
        assert!(text.contains("Names: 5 (4 distinct)"));
        assert!(text.contains("Clusters: 2"));
    }
}
