//! Query-time name resolution against a frozen [`Registry`].
//!
//! Resolution normalizes the raw name, generates its blocking keys with the
//! token cap recorded in the registry, and checks every key. A miss is
//! the common, expected outcome for unseen players and is never an error.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::identity::CanonicalId;
use crate::keys::{KeyGenerator, DEFAULT_MAX_TOKENS};
use crate::normalize::normalize;
use crate::registry::Registry;

/// Outcome of resolving one raw name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every matching key agrees on one id.
    Mapped(CanonicalId),
    /// No key matched; also the result for names with no tokens.
    Unmapped,
    /// Keys matched different ids. Ids are distinct, in key order.
    Divergent(Vec<CanonicalId>),
}

impl Resolution {
    /// The resolved id. For divergent hits, the id of the first key.
    #[must_use]
    pub fn canonical_id(&self) -> Option<CanonicalId> {
        match self {
            Self::Mapped(id) => Some(*id),
            Self::Unmapped => None,
            Self::Divergent(ids) => ids.first().copied(),
        }
    }

    /// True if the name did not resolve.
    #[must_use]
    pub const fn is_unmapped(&self) -> bool {
        matches!(self, Self::Unmapped)
    }
}

/// Read-only resolver over a shared registry.
///
/// Cheap to clone; clones share the registry. Safe to use from any number of
/// threads at once.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<Registry>,
    generator: KeyGenerator,
}

impl Resolver {
    /// Creates a resolver over a published registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        let generator = generator_for(&registry);
        Self { registry, generator }
    }

    /// The registry this resolver reads.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Resolves a raw name, reporting divergent hits explicitly.
    #[must_use]
    pub fn resolve_detailed(&self, raw: &str) -> Resolution {
        let keys = self.generator.generate(&normalize(raw));
        let mut ids: Vec<CanonicalId> = Vec::new();
        for key in &keys {
            if let Some(id) = self.registry.get(key.as_str()) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        match ids.len() {
            0 => Resolution::Unmapped,
            1 => Resolution::Mapped(ids[0]),
            _ => {
                warn!(
                    raw,
                    ids = ?ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "blocking keys of one name resolve to different players"
                );
                Resolution::Divergent(ids)
            }
        }
    }

    /// Resolves a raw name to its canonical id, or `None` if unmapped.
    ///
    /// # Examples
    ///
    /// ```
    /// use player_registry::{ClusterBuilder, Resolver};
    ///
    /// let registry = ClusterBuilder::new().build(&["Anna Lee"])?.into_shared();
    /// let resolver = Resolver::new(registry);
    /// assert!(resolver.resolve("LEE, Anna").is_some());
    /// assert!(resolver.resolve("Unknown Person").is_none());
    /// # Ok::<(), player_registry::RegistryError>(())
    /// ```
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<CanonicalId> {
        self.resolve_detailed(raw).canonical_id()
    }

    /// Resolves each name independently, preserving input order.
    pub fn resolve_batch<S: AsRef<str>>(&self, names: &[S]) -> Vec<Option<CanonicalId>> {
        names.iter().map(|n| self.resolve(n.as_ref())).collect()
    }

    /// Maps each distinct raw name, in first-seen order, to its id.
    pub fn map_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<(String, Option<CanonicalId>)> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(names.len());
        names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| seen.insert(*n))
            .map(|n| (n.to_string(), self.resolve(n)))
            .collect()
    }
}

/// Generator matching the registry's token cap. Registries from a build or
/// a checked load always carry a valid cap; anything else falls back to the
/// default with a warning, since its keys may not be reachable.
fn generator_for(registry: &Registry) -> KeyGenerator {
    KeyGenerator::new(registry.max_tokens()).unwrap_or_else(|err| {
        warn!(
            error = %err,
            fallback = DEFAULT_MAX_TOKENS,
            "registry token cap is invalid; resolving with the default cap"
        );
        KeyGenerator::default()
    })
}

/// Resolves one raw name against a registry.
#[must_use]
pub fn resolve(raw: &str, registry: &Registry) -> Option<CanonicalId> {
    let keys = generator_for(registry).generate(&normalize(raw));
    let mut found: Option<CanonicalId> = None;
    for key in &keys {
        match (found, registry.get(key.as_str())) {
            (None, hit) => found = hit,
            (Some(first), Some(other)) if first != other => {
                warn!(raw, first = %first, other = %other, "blocking keys of one name resolve to different players");
            }
            _ => {}
        }
    }
    found
}
