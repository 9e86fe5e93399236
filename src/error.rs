//! Error types for the player registry.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Note what is *not* here: a name that fails to resolve
//! is a normal `None`, and transliteration never fails.

use thiserror::Error;

use crate::identity::CanonicalId;

/// Validation errors raised while checking configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Token cap {value} is out of range [{min}, {max}]")]
    TokenCapOutOfRange {
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("Field '{field}' must be at least {min} (got {actual})")]
    BelowMinimum {
        field: String,
        min: usize,
        actual: usize,
    },

    #[error("Invalid canonical id '{input}': expected 'player_<n>'")]
    InvalidCanonicalId {
        input: String,
    },
}

/// Errors that abort a registry build.
///
/// Every variant here means the registry would have been corrupt; a failed
/// build is always preferred over publishing it.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "Key conflict on '{key}': already assigned {existing} via '{existing_name}', \
         but '{name}' belongs to {attempted}"
    )]
    KeyConflict {
        key: String,
        existing: CanonicalId,
        attempted: CanonicalId,
        existing_name: String,
        name: String,
    },

    #[error("Failed to spawn shard worker: {reason}")]
    WorkerSpawn {
        reason: String,
    },

    #[error("Shard worker pool disconnected after {completed} of {expected} shards")]
    PoolDisconnected {
        completed: usize,
        expected: usize,
    },

    #[error("Cluster count {count} exceeds the canonical id space")]
    IdSpaceExhausted {
        count: usize,
    },
}

/// Errors from the registry file store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry file is corrupted: {reason}")]
    Corrupted {
        reason: String,
    },

    #[error("Unsupported registry format version {found} (expected {expected})")]
    UnsupportedVersion {
        found: u32,
        expected: u32,
    },

    #[error("Registry fingerprint mismatch: header={expected}, computed={actual}")]
    FingerprintMismatch {
        expected: String,
        actual: String,
    },

    #[error("Registry is locked by another writer: {path}")]
    Locked {
        path: String,
    },

    #[error("No registry has been published at {location}")]
    Missing {
        location: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Top-level error type for the player registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl RegistryError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a build error.
    #[must_use]
    pub const fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this error indicates on-disk corruption.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Storage(
                StorageError::Corrupted { .. } | StorageError::FingerprintMismatch { .. }
            )
        )
    }
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
