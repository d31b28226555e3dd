//! Error type for diffgraph-storage.

use thiserror::Error;

/// Storage error kinds (spec §7 "Error handling", `[AMBIENT]` storage
/// section): a writer only ever fails on I/O or serialization, so the enum
/// is flat rather than the richer `kind`/`message` split a relational
/// backend would need.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error writing fixed point: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize fixed point: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for diffgraph-storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
