//! Error types for Warden Core.

use thiserror::Error;

/// Core errors raised by decoding and serialization helpers.
///
/// Verification entry points never return these; they fold every failure
/// into their structured result instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors produced while loading a ledger document.
///
/// These are hard failures: a ledger that does not parse is never partially
/// verified.
#[derive(Debug, Error)]
pub enum LedgerParseError {
    #[error("invalid JSON at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("ledger line {line} is not a JSON object")]
    NotAnObject { line: usize },

    #[error("ledger array element {index} is not a JSON object")]
    ElementNotAnObject { index: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
