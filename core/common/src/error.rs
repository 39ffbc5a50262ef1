//! Common error types for dbferry.

use thiserror::Error;

/// Top-level error type for dbferry operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or contradictory configuration, caught before any side effect.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authorization failed; the operator must re-authorize out of band.
    #[error("Authorization error: {0}")]
    Auth(String),

    /// The database dump command failed.
    #[error("Dump error: {0}")]
    Dump(String),

    /// A remote API call failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backup itself succeeded but retention pruning did not complete.
    #[error("Prune incomplete: {0}")]
    Prune(String),
}

impl Error {
    /// Process exit code for this error category.
    ///
    /// The codes distinguish "backup ok but prune failed" from total
    /// failure so schedulers can alert accordingly.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::Auth(_) => 3,
            Error::Dump(_) => 4,
            Error::Network(_) | Error::NotFound(_) | Error::Io(_) | Error::Serialization(_) => 5,
            Error::Prune(_) => 6,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
