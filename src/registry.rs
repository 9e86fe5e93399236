//! The immutable key → canonical id registry.
//!
//! A [`Registry`] is produced by a cluster build and never mutated afterwards.
//! Publish it behind an `Arc` and hand clones to as many resolvers or threads
//! as needed; lookups take `&self` only.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::identity::{BlockingKey, CanonicalId};
use crate::keys::{DEFAULT_MAX_TOKENS, MAX_TOKENS_LIMIT};

/// Frozen mapping from blocking key to canonical id.
///
/// Carries the token cap it was built with so resolvers generate the same
/// key space. Deserialization rejects registries that fail the integrity
/// check (token cap out of range, sparse or out-of-range ids).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RegistryRepr")]
pub struct Registry {
    entries: BTreeMap<BlockingKey, CanonicalId>,
    cluster_count: u32,
    max_tokens: usize,
}

/// Unchecked wire form of [`Registry`].
#[derive(Deserialize)]
struct RegistryRepr {
    entries: BTreeMap<BlockingKey, CanonicalId>,
    cluster_count: u32,
    max_tokens: usize,
}

impl TryFrom<RegistryRepr> for Registry {
    type Error = String;

    fn try_from(repr: RegistryRepr) -> Result<Self, Self::Error> {
        let registry = Self::from_parts(repr.entries, repr.cluster_count, repr.max_tokens);
        registry.check_integrity()?;
        Ok(registry)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            cluster_count: 0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl Registry {
    /// Assembles a registry. Only builds create these.
    pub(crate) fn from_parts(
        entries: BTreeMap<BlockingKey, CanonicalId>,
        cluster_count: u32,
        max_tokens: usize,
    ) -> Self {
        Self {
            entries,
            cluster_count,
            max_tokens,
        }
    }

    /// An empty registry; every lookup misses.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Token cap the registry's keys were generated with.
    #[must_use]
    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Moves the registry behind an `Arc` for sharing across resolvers.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Looks up one blocking key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CanonicalId> {
        self.entries.get(key).copied()
    }

    /// True if the key is known.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no keys are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of clusters, i.e. distinct canonical ids.
    #[must_use]
    pub const fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    /// Iterates `(key, id)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockingKey, CanonicalId)> {
        self.entries.iter().map(|(k, id)| (k, *id))
    }

    /// All keys mapped to `id`, in key order.
    #[must_use]
    pub fn keys_for(&self, id: CanonicalId) -> Vec<&BlockingKey> {
        self.entries
            .iter()
            .filter(|(_, v)| **v == id)
            .map(|(k, _)| k)
            .collect()
    }

    /// Content fingerprint (BLAKE3, hex) over the sorted entries.
    ///
    /// Two registries with the same pairs, cluster count and token cap share a
    /// fingerprint, regardless of how they were built.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut h = Hasher::new();
        h.update(&self.cluster_count.to_le_bytes());
        h.update(&(self.max_tokens as u64).to_le_bytes());
        for (key, id) in &self.entries {
            h.update(&(key.as_str().len() as u64).to_le_bytes());
            h.update(key.as_str().as_bytes());
            h.update(&id.index().to_le_bytes());
        }
        h.finalize().to_hex().to_string()
    }

    /// Checks the structural invariants a deserialized registry must hold:
    /// a valid token cap, and dense ids (every id in `0..cluster_count` used,
    /// none out of range).
    pub(crate) fn check_integrity(&self) -> Result<(), String> {
        if !(1..=MAX_TOKENS_LIMIT).contains(&self.max_tokens) {
            return Err(format!("token cap {} out of range", self.max_tokens));
        }
        let mut seen = BTreeSet::new();
        for (key, id) in &self.entries {
            if id.index() >= self.cluster_count {
                return Err(format!(
                    "key '{key}' maps to {id}, beyond cluster count {}",
                    self.cluster_count
                ));
            }
            seen.insert(*id);
        }
        if seen.len() as u64 != u64::from(self.cluster_count) {
            return Err(format!(
                "{} of {} canonical ids are referenced by keys",
                seen.len(),
                self.cluster_count
            ));
        }
        Ok(())
    }

    /// Summary statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            key_count: self.entries.len(),
            cluster_count: self.cluster_count,
            fingerprint: self.fingerprint(),
        }
    }
}

/// Registry statistics for logs and CLI output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    /// Registered blocking keys.
    pub key_count: usize,
    /// Distinct canonical ids.
    pub cluster_count: u32,
    /// BLAKE3 content fingerprint, hex.
    pub fingerprint: String,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Registry statistics:")?;
        writeln!(f, "  Keys: {}", self.key_count)?;
        writeln!(f, "  Clusters: {}", self.cluster_count)?;
        write!(f, "  Fingerprint: {}", &self.fingerprint[..16])
    }
}
