//! The cluster build: union-find over names, dense ids, conflict-checked
//! registry population.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::error::{BuildError, RegistryResult};
use crate::identity::{BlockingKey, CanonicalId};
use crate::keys::{KeyGenerator, KeySet};
use crate::registry::Registry;

use super::shard;
use super::union_find::UnionFind;
use super::{BuildConfig, BuildReport, BuildStats, Cluster};

/// Builds a [`Registry`] from an ordered corpus of raw names.
///
/// # Example
/// ```
/// use player_registry::ClusterBuilder;
///
/// let registry = ClusterBuilder::new()
///     .max_tokens(4)
///     .build(&["Anna Lee", "Lee Anna", "John Smith"])?;
/// assert_eq!(registry.cluster_count(), 2);
/// # Ok::<(), player_registry::RegistryError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClusterBuilder {
    config: BuildConfig,
}

impl ClusterBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from an explicit configuration.
    #[must_use]
    pub fn with_config(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Set the token cap for key generation.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the number of key-generation workers.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the shard size handed to each worker.
    #[must_use]
    pub fn shard_size(mut self, shard_size: usize) -> Self {
        self.config.shard_size = shard_size;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds the registry.
    ///
    /// # Errors
    /// Fails on invalid configuration, a shard pool failure, or a key
    /// assignment conflict. An empty corpus is not an error.
    pub fn build<S: AsRef<str>>(&self, names: &[S]) -> RegistryResult<Registry> {
        Ok(self.build_report(names)?.into_registry())
    }

    /// Builds the registry and returns clusters and counters alongside it.
    ///
    /// # Errors
    /// See [`ClusterBuilder::build`].
    pub fn build_report<S: AsRef<str>>(&self, names: &[S]) -> RegistryResult<BuildReport> {
        let config = self.config.clone().validate()?;
        let generator = KeyGenerator::new(config.max_tokens)?;
        let key_sets = shard::generate_all(
            names,
            generator,
            config.workers,
            config.shard_size,
            config.queue_capacity,
        )?;

        let (mut uf, first_holder) = merge(&key_sets);
        let name_ids = assign_ids(&mut uf, &key_sets)?;
        let entries = populate(names, &key_sets, &name_ids, &first_holder)?;
        let cluster_count = name_ids.iter().flatten().map(|id| id.index() + 1).max().unwrap_or(0);

        let mut clusters: Vec<Cluster> = (0..cluster_count)
            .map(|i| Cluster {
                id: CanonicalId::new(i),
                members: Vec::new(),
            })
            .collect();
        let mut assignments = Vec::new();
        let mut seen: HashSet<&str> = HashSet::with_capacity(names.len());
        let mut skipped = 0usize;
        for (idx, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let first = seen.insert(name);
            match name_ids[idx] {
                Some(id) if first => {
                    clusters[id.as_usize()].members.push(name.to_string());
                    assignments.push((name.to_string(), id));
                }
                Some(_) => {}
                None => {
                    debug!(index = idx, raw = name, "name has no tokens; skipped");
                    skipped += 1;
                }
            }
        }

        let stats = BuildStats {
            names: names.len(),
            distinct_names: seen.len(),
            skipped,
            truncated: key_sets.iter().filter(|k| k.was_truncated()).count(),
            keys: entries.len(),
            clusters: cluster_count as usize,
        };
        info!(
            names = stats.names,
            distinct = stats.distinct_names,
            skipped = stats.skipped,
            truncated = stats.truncated,
            keys = stats.keys,
            clusters = stats.clusters,
            "registry built"
        );

        Ok(BuildReport {
            registry: Registry::from_parts(entries, cluster_count, config.max_tokens),
            clusters,
            stats,
            assignments,
        })
    }
}

/// Builds a registry with the default configuration.
///
/// # Errors
/// See [`ClusterBuilder::build`].
pub fn build<S: AsRef<str>>(names: &[S]) -> RegistryResult<Registry> {
    ClusterBuilder::new().build(names)
}

/// Unions every name with the first name that produced each of its keys.
fn merge(key_sets: &[KeySet]) -> (UnionFind, HashMap<&BlockingKey, usize>) {
    let mut uf = UnionFind::new(key_sets.len());
    let mut first_holder: HashMap<&BlockingKey, usize> = HashMap::new();
    for (idx, keys) in key_sets.iter().enumerate() {
        for key in keys {
            match first_holder.entry(key) {
                Entry::Occupied(holder) => {
                    uf.union(idx, *holder.get());
                }
                Entry::Vacant(slot) => {
                    slot.insert(idx);
                }
            }
        }
    }
    (uf, first_holder)
}

/// Numbers clusters densely by lowest member index.
///
/// Scanning indices in order means the first time a root is met is at its
/// cluster's minimum index. Names without keys get no id.
fn assign_ids(uf: &mut UnionFind, key_sets: &[KeySet]) -> Result<Vec<Option<CanonicalId>>, BuildError> {
    let mut root_ids: HashMap<usize, CanonicalId> = HashMap::new();
    let mut name_ids = Vec::with_capacity(key_sets.len());
    for (idx, keys) in key_sets.iter().enumerate() {
        if keys.is_empty() {
            name_ids.push(None);
            continue;
        }
        let next = root_ids.len();
        let id = match root_ids.entry(uf.find(idx)) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let index = u32::try_from(next).map_err(|_| BuildError::IdSpaceExhausted { count: next + 1 })?;
                *e.insert(CanonicalId::new(index))
            }
        };
        name_ids.push(Some(id));
    }
    Ok(name_ids)
}

/// Writes every key of every clustered name. A key already bound to a
/// different id aborts the build.
fn populate<S: AsRef<str>>(
    names: &[S],
    key_sets: &[KeySet],
    name_ids: &[Option<CanonicalId>],
    first_holder: &HashMap<&BlockingKey, usize>,
) -> Result<BTreeMap<BlockingKey, CanonicalId>, BuildError> {
    let mut entries: BTreeMap<BlockingKey, CanonicalId> = BTreeMap::new();
    for (idx, keys) in key_sets.iter().enumerate() {
        let Some(id) = name_ids[idx] else {
            continue;
        };
        for key in keys {
            match entries.get(key) {
                Some(&existing) if existing != id => {
                    let holder = first_holder.get(key).copied().unwrap_or(idx);
                    return Err(BuildError::KeyConflict {
                        key: key.to_string(),
                        existing,
                        attempted: id,
                        existing_name: names[holder].as_ref().to_string(),
                        name: names[idx].as_ref().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    entries.insert(key.clone(), id);
                }
            }
        }
    }
    Ok(entries)
}
