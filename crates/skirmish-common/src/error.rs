//! Error types shared across Skirmish crates.

use thiserror::Error;

/// Top-level error type for Skirmish operations.
///
/// Nothing on the per-frame path returns this; it covers the load and save
/// boundaries around the combat core.
#[derive(Debug, Error)]
pub enum SkirmishError {
    /// Content definitions could not be loaded
    #[error("Content error: {0}")]
    Content(String),

    /// Durable state could not be encoded or decoded
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration was unreadable
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },
}

/// Result type alias for Skirmish operations.
pub type SkirmishResult<T> = Result<T, SkirmishError>;
