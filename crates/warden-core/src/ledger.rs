//! Hash-chained, signed append-only ledger.
//!
//! ## Entry format
//!
//! ```json
//! {"content": {...}, "prevHash": "<hex>|null", "hash": "<hex>", "signature": "<hex>"}
//! ```
//!
//! - `hash` is the record digest of the entry (`hash`/`signature` stripped)
//! - `prevHash` is the previous entry's `hash`; the genesis entry has `null`
//! - `signature` is Ed25519 over the UTF-8 bytes of `hash`
//!
//! Entries are kept as raw JSON objects so verification hashes exactly the
//! fields that were written, including any this crate does not know about.
//!
//! ## Verification
//!
//! [`verify_ledger`] checks every entry and never stops at the first
//! problem, so one pass reports the complete defect set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::crypto::{Keypair, PublicKey, Signature};
use crate::digest::{hex_eq, record_digest_hex};
use crate::error::LedgerParseError;

/// A single ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerEntry(Map<String, Value>);

impl LedgerEntry {
    pub fn from_object(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value, if it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn content(&self) -> Option<&Value> {
        self.0.get("content")
    }

    pub fn prev_hash(&self) -> Option<&str> {
        self.0.get("prevHash").and_then(Value::as_str)
    }

    pub fn hash(&self) -> Option<&str> {
        self.0.get("hash").and_then(Value::as_str)
    }

    pub fn signature(&self) -> Option<&str> {
        self.0.get("signature").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Recompute an entry's hash from its fields.
pub fn compute_entry_hash(entry: &LedgerEntry) -> String {
    record_digest_hex(&entry.to_value())
}

/// Check the entry's signature over its own stored `hash`.
pub fn verify_entry_signature(entry: &LedgerEntry, public_key: &PublicKey) -> bool {
    let (Some(hash), Some(signature)) = (entry.hash(), entry.signature()) else {
        return false;
    };
    let Ok(signature) = Signature::decode(signature) else {
        return false;
    };
    public_key.verify(hash.as_bytes(), &signature).is_ok()
}

/// Category of a ledger defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    HashMismatch,
    ChainBroken,
    InvalidSignature,
}

/// A defect located at one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerIssue {
    pub index: usize,
    pub kind: IssueKind,
}

impl fmt::Display for LedgerIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            IssueKind::HashMismatch => "Hash mismatch",
            IssueKind::ChainBroken => "Chain broken",
            IssueKind::InvalidSignature => "Invalid signature",
        };
        write!(f, "{label} at index {}", self.index)
    }
}

/// Result of verifying a whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerReport {
    pub ok: bool,
    pub errors: Vec<LedgerIssue>,
}

impl LedgerReport {
    /// Human-readable messages, one per issue.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn issues_at(&self, index: usize) -> impl Iterator<Item = &LedgerIssue> {
        self.errors.iter().filter(move |issue| issue.index == index)
    }
}

/// Verify hashes, chain links and signatures of every entry.
///
/// A public key that does not decode makes every signature check fail
/// rather than erroring.
pub fn verify_ledger(entries: &[LedgerEntry], public_key: &str) -> LedgerReport {
    let key = PublicKey::decode(public_key).ok();
    let mut errors = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let hash_ok = entry
            .hash()
            .map_or(false, |stored| hex_eq(stored, &compute_entry_hash(entry)));
        if !hash_ok {
            errors.push(LedgerIssue {
                index,
                kind: IssueKind::HashMismatch,
            });
        }

        if index > 0 {
            let linked = match (entry.prev_hash(), entries[index - 1].hash()) {
                (Some(prev), Some(prior)) => hex_eq(prev, prior),
                _ => false,
            };
            if !linked {
                errors.push(LedgerIssue {
                    index,
                    kind: IssueKind::ChainBroken,
                });
            }
        }

        let signed = key
            .as_ref()
            .map_or(false, |key| verify_entry_signature(entry, key));
        if !signed {
            errors.push(LedgerIssue {
                index,
                kind: IssueKind::InvalidSignature,
            });
        }
    }

    LedgerReport {
        ok: errors.is_empty(),
        errors,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Writing
// ─────────────────────────────────────────────────────────────────────────────

/// Appends signed, chained entries.
///
/// Appends take `&mut self`; callers sharing a writer must serialize access.
#[derive(Debug)]
pub struct LedgerWriter {
    keypair: Keypair,
    tail: Option<String>,
    len: usize,
}

impl LedgerWriter {
    /// Start a new ledger whose first entry is the genesis entry.
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            tail: None,
            len: 0,
        }
    }

    /// Continue an existing ledger of `len` entries ending at `tail_hash`.
    pub fn resume(keypair: Keypair, tail_hash: impl Into<String>, len: usize) -> Self {
        Self {
            keypair,
            tail: Some(tail_hash.into()),
            len,
        }
    }

    pub fn append(&mut self, content: Value) -> LedgerEntry {
        let mut fields = Map::new();
        fields.insert("content".into(), content);
        fields.insert(
            "prevHash".into(),
            self.tail.clone().map_or(Value::Null, Value::String),
        );

        let hash = record_digest_hex(&Value::Object(fields.clone()));
        let signature = self.keypair.sign(hash.as_bytes());
        fields.insert("hash".into(), Value::String(hash.clone()));
        fields.insert("signature".into(), Value::String(signature.to_hex()));

        self.tail = Some(hash);
        self.len += 1;
        LedgerEntry(fields)
    }

    pub fn tail_hash(&self) -> Option<&str> {
        self.tail.as_deref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a ledger document: one JSON array, or one JSON object per line.
pub fn parse_ledger(text: &str) -> Result<Vec<LedgerEntry>, LedgerParseError> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let items: Vec<Value> =
            serde_json::from_str(text).map_err(|source| LedgerParseError::Json {
                line: source.line(),
                source,
            })?;
        return items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                LedgerEntry::from_value(item)
                    .ok_or(LedgerParseError::ElementNotAnObject { index })
            })
            .collect();
    }

    let mut entries = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|source| LedgerParseError::Json {
            line: line_no,
            source,
        })?;
        let entry =
            LedgerEntry::from_value(value).ok_or(LedgerParseError::NotAnObject { line: line_no })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Serialize entries as newline-delimited JSON.
pub fn to_ndjson(entries: &[LedgerEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_value().to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn writer() -> LedgerWriter {
        LedgerWriter::new(Keypair::from_seed(&[7u8; 32]))
    }

    fn ledger(n: usize) -> (Vec<LedgerEntry>, String) {
        let mut w = writer();
        let key = w.public_key().to_hex();
        let entries = (0..n).map(|i| w.append(json!({"seq": i}))).collect();
        (entries, key)
    }

    #[test]
    fn test_writer_chains_entries() {
        let (entries, _) = ledger(3);
        assert_eq!(entries[0].fields().get("prevHash"), Some(&Value::Null));
        assert_eq!(entries[1].prev_hash(), entries[0].hash());
        assert_eq!(entries[2].prev_hash(), entries[1].hash());
        assert_eq!(entries[1].hash().unwrap(), compute_entry_hash(&entries[1]));
    }

    #[test]
    fn test_valid_ledger_verifies() {
        let (entries, key) = ledger(5);
        let report = verify_ledger(&entries, &key);
        assert!(report.ok);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_empty_ledger_is_ok() {
        assert!(verify_ledger(&[], "irrelevant").ok);
    }

    #[test]
    fn test_content_tamper_localized() {
        let (mut entries, key) = ledger(5);
        let mut fields = entries[2].clone().into_fields();
        fields.insert("content".into(), json!({"seq": 99}));
        entries[2] = LedgerEntry::from_object(fields);

        let report = verify_ledger(&entries, &key);
        assert_eq!(report.messages(), vec!["Hash mismatch at index 2"]);
    }

    #[test]
    fn test_deletion_breaks_next_link() {
        let (mut entries, key) = ledger(5);
        entries.remove(2);

        let report = verify_ledger(&entries, &key);
        // The entry that followed the deleted one now sits at index 2.
        assert_eq!(report.messages(), vec!["Chain broken at index 2"]);
    }

    #[test]
    fn test_signature_replacement_localized() {
        let (mut entries, key) = ledger(4);
        let forged = Keypair::from_seed(&[9u8; 32]).sign(entries[1].hash().unwrap().as_bytes());
        let mut fields = entries[1].clone().into_fields();
        fields.insert("signature".into(), Value::String(forged.to_hex()));
        entries[1] = LedgerEntry::from_object(fields);

        let report = verify_ledger(&entries, &key);
        assert_eq!(report.messages(), vec!["Invalid signature at index 1"]);
        assert_eq!(report.issues_at(1).count(), 1);
        assert_eq!(report.issues_at(0).count(), 0);
    }

    #[test]
    fn test_malformed_key_fails_every_signature() {
        let (entries, _) = ledger(2);
        let report = verify_ledger(&entries, "not-a-key");
        assert_eq!(
            report.messages(),
            vec!["Invalid signature at index 0", "Invalid signature at index 1"]
        );
    }

    #[test]
    fn test_resume_continues_chain() {
        let (entries, key) = ledger(2);
        let tail = entries[1].hash().unwrap().to_string();
        let mut w = LedgerWriter::resume(Keypair::from_seed(&[7u8; 32]), tail, 2);
        let mut all = entries;
        all.push(w.append(json!({"seq": 2})));
        assert_eq!(w.len(), 3);
        assert!(verify_ledger(&all, &key).ok);
    }

    #[test]
    fn test_parse_array_and_ndjson() {
        let (entries, key) = ledger(3);
        let array = serde_json::to_string_pretty(&entries).unwrap();
        let ndjson = to_ndjson(&entries);

        let from_array = parse_ledger(&array).unwrap();
        let from_lines = parse_ledger(&ndjson).unwrap();
        assert_eq!(from_array, entries);
        assert_eq!(from_lines, entries);
        assert!(verify_ledger(&from_lines, &key).ok);
    }

    #[test]
    fn test_parse_blank_is_empty() {
        assert!(parse_ledger("").unwrap().is_empty());
        assert!(parse_ledger("  \n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_shapes() {
        assert!(matches!(
            parse_ledger("{\"a\":1}\n[1]\n"),
            Err(LedgerParseError::NotAnObject { line: 2 })
        ));
        assert!(matches!(
            parse_ledger("{\"a\":1}\n\n{oops\n"),
            Err(LedgerParseError::Json { line: 3, .. })
        ));
        assert!(matches!(
            parse_ledger("[{\"a\":1}, 2]"),
            Err(LedgerParseError::ElementNotAnObject { index: 1 })
        ));
        assert!(matches!(
            parse_ledger("42"),
            Err(LedgerParseError::NotAnObject { line: 1 })
        ));
        assert!(matches!(
            parse_ledger("[{\"a\":1},"),
            Err(LedgerParseError::Json { .. })
        ));
    }
}
