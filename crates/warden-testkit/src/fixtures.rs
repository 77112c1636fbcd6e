//! Test fixtures and helpers.
//!
//! Deterministic signers plus builders for signed manifests, ledgers and
//! sealed batches.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use warden_core::digest::strip_fields;
use warden_core::{
    canonical_bytes, canonicalize, record_digest_hex, seal_batch, CollapseBatch, Keypair,
    LedgerEntry, LedgerWriter,
};

/// File name used for manifests written by [`write_manifest_files`].
pub const MANIFEST_FILE: &str = "authority_map.json";

/// A set of deterministic signers.
pub struct TestFixture {
    pub maker: Keypair,
    pub checker: Keypair,
    pub ledger: Keypair,
    pub batch: Keypair,
}

impl TestFixture {
    /// Fixture with the default seeds.
    pub fn new() -> Self {
        Self::with_seed([0x42; 32])
    }

    /// Derive every signer from one seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let derive = |tag: u8| {
            let mut s = seed;
            s[0] ^= tag;
            Keypair::from_seed(&s)
        };
        Self {
            maker: derive(1),
            checker: derive(2),
            ledger: derive(3),
            batch: derive(4),
        }
    }

    /// A manifest signed by both maker and checker.
    pub fn signed_manifest(&self, binding_table: Value, effective_after: Value) -> Value {
        self.sign_manifest(json!({
            "binding_table": binding_table,
            "effective_after": effective_after,
        }))
    }

    /// Install both public keys in `unsigned` and sign it.
    pub fn sign_manifest(&self, mut unsigned: Value) -> Value {
        unsigned["maker"] = json!({"public_key": self.maker.public_key().to_hex()});
        unsigned["checker"] = json!({"public_key": self.checker.public_key().to_hex()});

        let payload = canonical_bytes(&strip_fields(&unsigned, &["signatures"]));
        unsigned["signatures"] = json!({
            "maker": self.maker.sign(&payload).to_hex(),
            "checker": self.checker.sign(&payload).to_base64(),
        });
        unsigned
    }

    /// A valid ledger of `n` entries signed by the ledger key.
    pub fn ledger(&self, n: usize) -> Vec<LedgerEntry> {
        let mut writer = LedgerWriter::new(self.ledger.clone());
        (0..n)
            .map(|i| writer.append(json!({"event": "gate_check", "seq": i})))
            .collect()
    }

    pub fn ledger_public_key(&self) -> String {
        self.ledger.public_key().to_hex()
    }

    /// A sealed batch of `n` items, signed when `signed` is set.
    pub fn sealed_batch(&self, n: usize, signed: bool) -> CollapseBatch {
        let signer = signed.then_some(&self.batch);
        // Items are always objects, so sealing cannot fail.
        seal_batch("batch-001", "epoch-7", batch_items(n), signer)
            .unwrap_or_else(|e| panic!("fixture batch failed to seal: {e}"))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Binding table used by the gate scenarios.
pub fn scenario_bindings() -> Value {
    json!([
        {"avatar": "Celine", "vessel": "aurora", "capsule": "luma", "gate": "THRUST_CONTROL"},
        {"avatar": "Orin", "vessel": "aurora", "capsule": "luma", "gate": "NAV_SYNC"},
    ])
}

/// `n` distinct batch items.
pub fn batch_items(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"id": format!("item-{i:03}"), "kind": "collapse", "weight": i + 1}))
        .collect()
}

/// Write `document` and its `.hash` / `.sig` siblings into `dir`.
///
/// Returns the manifest path.
pub fn write_manifest_files(dir: &Path, document: &Value) -> io::Result<PathBuf> {
    let path = dir.join(MANIFEST_FILE);
    std::fs::write(&path, serde_json::to_vec_pretty(document)?)?;
    std::fs::write(path.with_extension("hash"), record_digest_hex(document))?;
    let blob = document
        .get("signatures")
        .map(canonicalize)
        .unwrap_or_default();
    std::fs::write(path.with_extension("sig"), blob)?;
    Ok(path)
}
