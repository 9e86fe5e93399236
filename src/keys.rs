//! Blocking-key generation.
//!
//! A name's blocking keys are every ordering of its tokens, concatenated.
//! Two names that share any key are the same player as far as clustering is
//! concerned, so `"Anna Lee"` and `"Lee, Anna"` meet on `annalee`.
//!
//! Key count is `k!` for `k` tokens. The generator caps `k`; extra tokens are
//! dropped with a warning and reported on the returned [`KeySet`].

use std::collections::BTreeSet;

use tracing::warn;

use crate::error::ValidationError;
use crate::identity::BlockingKey;
use crate::normalize::TokenSequence;

/// Default token cap. Six tokens is 720 keys.
pub const DEFAULT_MAX_TOKENS: usize = 6;

/// Largest accepted token cap. Eight tokens is 40 320 keys per name.
pub const MAX_TOKENS_LIMIT: usize = 8;

/// Deduplicated blocking keys for one name, in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: BTreeSet<BlockingKey>,
    dropped_tokens: usize,
}

impl KeySet {
    /// Iterates keys in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockingKey> {
        self.keys.iter()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when the name produced no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True if `key` is in the set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Tokens discarded because the name exceeded the cap.
    #[must_use]
    pub const fn dropped_tokens(&self) -> usize {
        self.dropped_tokens
    }

    /// True if the cap truncated this name.
    #[must_use]
    pub const fn was_truncated(&self) -> bool {
        self.dropped_tokens > 0
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a BlockingKey;
    type IntoIter = std::collections::btree_set::Iter<'a, BlockingKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

/// Generates permutation keys under a token cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGenerator {
    max_tokens: usize,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl KeyGenerator {
    /// Creates a generator with the given token cap.
    ///
    /// # Errors
    /// Returns [`ValidationError::TokenCapOutOfRange`] unless
    /// `1 <= max_tokens <= MAX_TOKENS_LIMIT`.
    pub fn new(max_tokens: usize) -> Result<Self, ValidationError> {
        if !(1..=MAX_TOKENS_LIMIT).contains(&max_tokens) {
            return Err(ValidationError::TokenCapOutOfRange {
                value: max_tokens,
                min: 1,
                max: MAX_TOKENS_LIMIT,
            });
        }
        Ok(Self { max_tokens })
    }

    /// Returns the token cap.
    #[must_use]
    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Generates the key set of a token sequence.
    ///
    /// # Examples
    ///
    /// ```
    /// use player_registry::keys::KeyGenerator;
    /// use player_registry::normalize::normalize;
    ///
    /// let keys = KeyGenerator::default().generate(&normalize("Anna Lee"));
    /// assert_eq!(keys.len(), 2);
    /// assert!(keys.contains("annalee"));
    /// assert!(keys.contains("leeanna"));
    /// ```
    #[must_use]
    pub fn generate(&self, tokens: &TokenSequence) -> KeySet {
        let all = tokens.tokens();
        if all.is_empty() {
            return KeySet::default();
        }

        let kept = all.len().min(self.max_tokens);
        let dropped_tokens = all.len() - kept;
        if dropped_tokens > 0 {
            warn!(
                name = %tokens,
                tokens = all.len(),
                cap = self.max_tokens,
                dropped = dropped_tokens,
                "name exceeds token cap; trailing tokens dropped from blocking keys"
            );
        }

        let mut working: Vec<&str> = all[..kept].iter().map(String::as_str).collect();
        let mut keys = BTreeSet::new();
        permute(&mut working, 0, &mut keys);

        KeySet { keys, dropped_tokens }
    }
}

/// Generates blocking keys with the default token cap.
#[must_use]
pub fn generate_keys(tokens: &TokenSequence) -> KeySet {
    KeyGenerator::default().generate(tokens)
}

/// Emits every ordering of `tokens[start..]` into `out`, by swapping in place.
fn permute(tokens: &mut [&str], start: usize, out: &mut BTreeSet<BlockingKey>) {
    if start + 1 >= tokens.len() {
        out.insert(BlockingKey::from_tokens(&*tokens));
        return;
    }
    for i in start..tokens.len() {
        tokens.swap(start, i);
        permute(tokens, start + 1, out);
        tokens.swap(start, i);
    }
}
