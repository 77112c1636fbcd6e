//! Authority manifests and binding tuples.
//!
//! A manifest is a JSON document produced and signed out of band:
//!
//! ```json
//! {
//!   "binding_table": [{"avatar": "...", "vessel": "...", "capsule": "...", "gate": "..."}],
//!   "maker": {"public_key": "<hex|base64>"},
//!   "checker": {"public_key": "<hex|base64>"},
//!   "signatures": {"maker": "<sig>", "checker": "<sig>"},
//!   "effective_after": "2025-01-01T00:00:00Z"
//! }
//! ```
//!
//! The raw document is kept next to a typed view so the hash and the signed
//! payload always cover exactly what was loaded.

use std::collections::HashMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::digest::strip_fields;
use warden_core::{canonical_bytes, record_digest_hex, verify_duo, DuoKeys, DuoVerification};

use crate::error::ProviderError;

/// Top-level field excluded from the signed payload.
pub const SIGNATURES_FIELD: &str = "signatures";

/// The scope a request asks to act in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingTuple {
    pub avatar: String,
    pub vessel: String,
    pub capsule: String,
    pub gate: String,
}

impl BindingTuple {
    pub fn new(
        avatar: impl Into<String>,
        vessel: impl Into<String>,
        capsule: impl Into<String>,
        gate: impl Into<String>,
    ) -> Self {
        Self {
            avatar: avatar.into(),
            vessel: vessel.into(),
            capsule: capsule.into(),
            gate: gate.into(),
        }
    }

    /// Trimmed avatar, lower-case vessel and capsule, upper-case gate.
    pub fn normalized(&self) -> Self {
        Self {
            avatar: self.avatar.trim().to_string(),
            vessel: self.vessel.trim().to_lowercase(),
            capsule: self.capsule.trim().to_lowercase(),
            gate: self.gate.trim().to_uppercase(),
        }
    }

    /// Read a tuple from an object holding four non-blank string fields.
    pub fn from_value(value: &Value) -> Option<Self> {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Some(Self {
            avatar: field("avatar")?,
            vessel: field("vessel")?,
            capsule: field("capsule")?,
            gate: field("gate")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ManifestView {
    #[serde(default)]
    binding_table: Vec<BindingTuple>,
    #[serde(default)]
    maker: Option<SignerKey>,
    #[serde(default)]
    checker: Option<SignerKey>,
    #[serde(default)]
    signatures: Option<ManifestSignatures>,
    #[serde(default)]
    effective_after: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SignerKey {
    #[serde(default)]
    public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestSignatures {
    #[serde(default)]
    maker: Option<String>,
    #[serde(default)]
    checker: Option<String>,
}

/// A parsed authority manifest.
#[derive(Debug, Clone)]
pub struct AuthorityManifest {
    document: Value,
    bindings: Vec<BindingTuple>,
    maker_key: Option<String>,
    checker_key: Option<String>,
    maker_signature: Option<String>,
    checker_signature: Option<String>,
    effective_after: Option<Value>,
}

impl AuthorityManifest {
    pub fn from_value(document: Value) -> Result<Self, ProviderError> {
        if !document.is_object() {
            return Err(ProviderError::Malformed("manifest is not a JSON object".into()));
        }
        let view: ManifestView = serde_json::from_value(document.clone())
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let signatures = view.signatures;

        Ok(Self {
            bindings: view.binding_table.iter().map(BindingTuple::normalized).collect(),
            maker_key: view.maker.and_then(|k| k.public_key),
            checker_key: view.checker.and_then(|k| k.public_key),
            maker_signature: signatures.as_ref().and_then(|s| s.maker.clone()),
            checker_signature: signatures.and_then(|s| s.checker),
            effective_after: view.effective_after,
            document,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProviderError> {
        let document =
            serde_json::from_slice(bytes).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Self::from_value(document)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Normalized binding rows, in table order.
    pub fn bindings(&self) -> &[BindingTuple] {
        &self.bindings
    }

    pub fn maker_key(&self) -> Option<&str> {
        self.maker_key.as_deref()
    }

    pub fn checker_key(&self) -> Option<&str> {
        self.checker_key.as_deref()
    }

    /// Raw `effective_after` value as written.
    pub fn effective_after(&self) -> Option<&Value> {
        self.effective_after.as_ref()
    }

    /// `effective_after` in epoch milliseconds, if it parses.
    pub fn effective_after_ms(&self) -> Option<i64> {
        self.effective_after.as_ref().and_then(parse_effective_after)
    }

    /// Fresh canonical hash of the document.
    pub fn manifest_hash(&self) -> String {
        record_digest_hex(&self.document)
    }

    /// Bytes both signers sign: the canonical document without `signatures`.
    pub fn signed_payload(&self) -> Vec<u8> {
        canonical_bytes(&strip_fields(&self.document, &[SIGNATURES_FIELD]))
    }

    pub fn verify_signatures(&self) -> DuoVerification {
        verify_duo(
            &self.signed_payload(),
            self.maker_signature.as_deref(),
            self.checker_signature.as_deref(),
            DuoKeys {
                maker_key: self.maker_key.as_deref(),
                checker_key: self.checker_key.as_deref(),
            },
        )
    }

    /// First row matching the normalized request.
    pub fn find_binding(&self, requested: &BindingTuple) -> Option<&BindingTuple> {
        let wanted = requested.normalized();
        self.bindings.iter().find(|row| **row == wanted)
    }

    /// Rows that appear more than once after normalization.
    pub fn duplicate_bindings(&self) -> Vec<BindingTuple> {
        let mut counts: HashMap<&BindingTuple, usize> = HashMap::new();
        let mut duplicates = Vec::new();
        for row in &self.bindings {
            let count = counts.entry(row).or_insert(0);
            *count += 1;
            if *count == 2 {
                duplicates.push(row.clone());
            }
        }
        duplicates
    }
}

/// Parse an RFC 3339 timestamp or epoch milliseconds.
///
/// Fractional milliseconds are floored. Numbers outside the `i64` range are
/// unparseable.
pub fn parse_effective_after(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let ms = n.as_f64()?.floor();
            (ms.is_finite() && ms >= i64::MIN as f64 && ms < i64::MAX as f64)
                .then_some(ms as i64)
        }),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.timestamp_millis()),
        _ => None,
    }
}

/// A manifest together with everything the provider learned while loading it.
#[derive(Debug, Clone)]
pub struct AuthorityMap {
    pub manifest: AuthorityManifest,
    /// Hash computed from the loaded document.
    pub hash: String,
    /// Hash stored beside the manifest, if any.
    pub expected_hash: Option<String>,
    pub hash_matches: bool,
    pub duo: DuoVerification,
    pub has_signature_file: bool,
}

impl AuthorityMap {
    /// Compute the hash and signature checks for a loaded manifest.
    pub fn assemble(
        manifest: AuthorityManifest,
        expected_hash: Option<String>,
        signature_blob: Option<&[u8]>,
    ) -> Self {
        let hash = manifest.manifest_hash();
        let expected_hash = expected_hash
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        let hash_matches = expected_hash
            .as_deref()
            .map_or(false, |expected| warden_core::hex_eq(expected, &hash));
        let has_signature_file = signature_blob.map_or(false, |blob| {
            !String::from_utf8_lossy(blob).trim().is_empty()
        });

        Self {
            duo: manifest.verify_signatures(),
            manifest,
            hash,
            expected_hash,
            hash_matches,
            has_signature_file,
        }
    }
}
