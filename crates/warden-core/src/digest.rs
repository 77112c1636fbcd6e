//! SHA-256 digests over canonical JSON.
//!
//! Records that carry their own `hash` or `signature` fields are digested
//! with those fields removed from the top level, so a record can embed its
//! own digest without changing it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::canonical::canonical_bytes;
use crate::error::{CoreError, Result};

/// Top-level fields excluded when digesting a self-referential record.
pub const SELF_REFERENTIAL_FIELDS: [&str; 2] = ["hash", "signature"];

/// A 32-byte SHA-256 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash of `left || right`.
    pub fn concat(left: &Self, right: &Self) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(left.0);
        hasher.update(right.0);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string (either case).
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidHex("expected 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// SHA-256 over the canonical bytes of `value`.
pub fn digest(value: &Value) -> Sha256Hash {
    Sha256Hash::hash(&canonical_bytes(value))
}

/// Lowercase hex form of [`digest`].
pub fn digest_hex(value: &Value) -> String {
    digest(value).to_hex()
}

/// Digest of a self-referential record: `hash` and `signature` stripped first.
pub fn record_digest(value: &Value) -> Sha256Hash {
    digest(&strip_self_references(value))
}

/// Lowercase hex form of [`record_digest`].
pub fn record_digest_hex(value: &Value) -> String {
    record_digest(value).to_hex()
}

/// The exact document [`record_digest`] hashes.
pub fn strip_self_references(value: &Value) -> Value {
    strip_fields(value, &SELF_REFERENTIAL_FIELDS)
}

/// Copy of `value` without the named top-level fields.
///
/// Non-object values are returned unchanged.
pub fn strip_fields(value: &Value, fields: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !fields.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Compare two hex digests without regard to case.
pub fn hex_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
