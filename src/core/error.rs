//! Error types for the memory tree.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by tree, persistence and oracle operations.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The referenced parent id is not in the index.
    #[error("Parent node not found: {0}")]
    ParentNotFound(String),

    /// A child with this key already exists under the parent.
    #[error("Category already exists: {0}")]
    DuplicateCategory(String),

    /// Node lookup by id failed.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Category name is empty, reserved, or contains a separator.
    #[error("Invalid category name: {0:?}")]
    InvalidName(String),

    /// Path cannot be used for this operation.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The initial schema could not be read or parsed.
    #[error("Failed to load schema {path}: {reason}")]
    SchemaLoad { path: PathBuf, reason: String },

    /// The persisted store file is malformed.
    #[error("Corrupt store file {path}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    /// The store file could not be written.
    #[error("Failed to persist store to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external oracle call failed or answered with an unusable shape.
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// A thread panicked while holding the store lock.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl TreeError {
    pub fn schema_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SchemaLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn corrupt_store(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CorruptStore {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn oracle(reason: impl ToString) -> Self {
        Self::OracleUnavailable(reason.to_string())
    }

    /// Whether the process cannot continue with this store.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SchemaLoad { .. }
                | Self::CorruptStore { .. }
                | Self::Persistence { .. }
                | Self::LockPoisoned
        )
    }
}

/// Result alias for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
