//! Error types for diffgraph-core
//!
//! Unified error handling across the matching engine (see spec §7).

use thiserror::Error;

/// Main error type for the matching engine.
///
/// `Load` and `Config` are fatal for the current comparison; `MatchingWarning`
/// and `ScoringWarning` are recoverable and only ever logged by the driver
/// (see [`crate::matching::driver`]) — they are part of this enum so callers
/// that want to surface them (e.g. in a diagnostic report) can match on them,
/// not because they propagate via `?`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The loader returned an incomplete or malformed call graph.
    #[error("load error: {0}")]
    Load(String),

    /// Unknown step name, weights not summing to 1, or inconsistent step list.
    #[error("config error: {0}")]
    Config(String),

    /// A step raised an internal inconsistency; the candidate was dropped.
    #[error("matching warning in step {step}: {detail}")]
    MatchingWarning {
        step: &'static str,
        detail: String,
    },

    /// A scoring feature could not be computed (e.g. division by zero on an
    /// empty graph). The feature contributes 0 and a diagnostic flag is set
    /// on the offending `FixedPoint`.
    #[error("scoring warning for function {function:#x}: {detail}")]
    ScoringWarning { function: u64, detail: String },

    /// The comparison was cancelled between steps or per-function workers.
    #[error("comparison cancelled")]
    Cancelled,
}

/// Result type alias for diffgraph-core operations.
pub type Result<T> = std::result::Result<T, EngineError>;
