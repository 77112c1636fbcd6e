//! Error types for the gate.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while fetching an authority manifest.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The manifest document does not exist.
    #[error("manifest not found: {0}")]
    NotFound(String),

    /// Filesystem or transport failure.
    #[error("manifest I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The fetch did not finish in time.
    #[error("manifest fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The document exceeds the configured byte ceiling.
    #[error("manifest is larger than {limit} bytes")]
    TooLarge { limit: u64 },

    /// The document is not a usable manifest.
    #[error("malformed manifest: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether retrying the same fetch may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Io(_) | ProviderError::Timeout(_))
    }
}

/// Errors reported by a ledger sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("ledger sink unavailable: {0}")]
    Unavailable(String),

    #[error("ledger sink rejected event: {0}")]
    Rejected(String),
}

/// Errors raised while constructing a gate.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid gate configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for gate construction and configuration.
pub type Result<T> = std::result::Result<T, GateError>;
