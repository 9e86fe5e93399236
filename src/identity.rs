//! Identity types: canonical player ids and blocking keys.
//!
//! A [`CanonicalId`] is the stable identity anchor that downstream feature
//! pipelines join on. A [`BlockingKey`] is the derived string the registry is
//! actually keyed by; the indirection lets a name never seen at build time
//! resolve as long as it normalizes to a known key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Prefix of the external rendering of a [`CanonicalId`].
pub const CANONICAL_ID_PREFIX: &str = "player_";

/// Dense, build-assigned player identifier.
///
/// Ids are numbered from zero in order of each cluster's first appearance in
/// the build corpus. Externally they render as `player_<n>`.
///
/// # Examples
///
/// ```
/// use player_registry::CanonicalId;
///
/// let id = CanonicalId::new(7);
/// assert_eq!(id.to_string(), "player_7");
/// assert_eq!("player_7".parse::<CanonicalId>().unwrap(), id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(u32);

impl CanonicalId {
    /// Creates an id from its dense index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the dense index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Returns the dense index as a `usize`, for slice addressing.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CANONICAL_ID_PREFIX}{}", self.0)
    }
}

impl FromStr for CanonicalId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(CANONICAL_ID_PREFIX)
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidCanonicalId {
                input: s.to_string(),
            })
    }
}

impl From<CanonicalId> for u32 {
    fn from(id: CanonicalId) -> Self {
        id.0
    }
}

/// One token-order permutation of a normalized name, concatenated.
///
/// `["anna", "lee"]` yields the keys `annalee` and `leeanna`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockingKey(String);

impl BlockingKey {
    /// Wraps an already-concatenated key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Builds a key by concatenating tokens with no separator.
    #[must_use]
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let len = tokens.iter().map(|t| t.as_ref().len()).sum();
        let mut key = String::with_capacity(len);
        for token in tokens {
            key.push_str(token.as_ref());
        }
        Self(key)
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlockingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for BlockingKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
