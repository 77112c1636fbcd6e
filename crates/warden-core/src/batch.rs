//! Collapse batches and their verification receipts.
//!
//! A batch is an ordered list of opaque JSON items sealed under one Merkle
//! root. Each item carries its own Merkle metadata:
//!
//! ```json
//! {"id": "a", ..., "merkle": {"leaf_hash": "<hex>", "proof_path": [{"position": "right", "hash": "<hex>"}]}}
//! ```
//!
//! [`build_verification_receipt`] recomputes everything it can and reports
//! booleans and identifiers only, so receipts diff cleanly against fixtures.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::canonical::canonicalize;
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::digest::{hex_eq, Sha256Hash};
use crate::error::{CoreError, Result};
use crate::merkle::{leaf_hash, merkle_root, verify_proof, MerkleTree, ProofStep, MERKLE_FIELD};

/// A sealed batch of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapseBatch {
    pub batch_id: String,
    pub epoch_id: String,
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub merkle_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_pub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl CollapseBatch {
    /// Parse a batch document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CoreError::MalformedInput(e.to_string()))
    }

    /// The compact header covered by the batch signature.
    pub fn header(&self) -> Value {
        json!({
            "batch_id": self.batch_id,
            "epoch_id": self.epoch_id,
            "merkle_root": self.merkle_root,
            "item_count": self.items.len(),
        })
    }

    /// Canonical bytes of [`Self::header`].
    pub fn header_bytes(&self) -> Vec<u8> {
        canonicalize(&self.header()).into_bytes()
    }
}

/// Merkle metadata stored on an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMerkle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_path: Option<Vec<ProofStep>>,
}

impl ItemMerkle {
    /// Read an item's `merkle` field. Anything unreadable counts as absent.
    pub fn of(item: &Value) -> Self {
        item.get(MERKLE_FIELD)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

/// Identifier an item is reported under: its `id`, else `item-<index>`.
pub fn item_identifier(item: &Value, index: usize) -> String {
    match item.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("item-{index}"),
    }
}

/// Receipt produced by verifying a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReceipt {
    pub batch_id: String,
    pub epoch_id: String,
    pub item_count: usize,
    pub merkle_root: Option<String>,
    pub recomputed_root: Option<String>,
    pub merkle_ok: bool,
    pub leaves_ok: bool,
    pub proofs: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_error: Option<String>,
    pub ok: bool,
}

/// Verify a batch's root, every item's proof, and the optional header signature.
///
/// `recomputed_root` is built over the stored leaf hashes when every item
/// has one, otherwise over leaves recomputed from the payloads. Proofs are
/// always checked with the recomputed payload leaf against the stored root,
/// and `leaves_ok` flags any payload that no longer matches its stored leaf.
pub fn build_verification_receipt(batch: &CollapseBatch) -> VerificationReceipt {
    let metas: Vec<ItemMerkle> = batch.items.iter().map(ItemMerkle::of).collect();
    let payload_leaves: Vec<Sha256Hash> = batch.items.iter().map(leaf_hash).collect();

    let stored_leaves: Option<Vec<Sha256Hash>> = metas
        .iter()
        .map(|m| {
            m.leaf_hash
                .as_deref()
                .and_then(|h| Sha256Hash::from_hex(h).ok())
        })
        .collect();

    let leaves_ok = stored_leaves.as_ref() == Some(&payload_leaves);

    let recomputed_root =
        merkle_root(stored_leaves.as_deref().unwrap_or(&payload_leaves)).map(|r| r.to_hex());

    let stored_root = batch
        .merkle_root
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let merkle_ok = match (stored_root, recomputed_root.as_deref()) {
        (Some(stored), Some(recomputed)) => hex_eq(stored, recomputed),
        (None, None) => true,
        _ => false,
    };

    let root = stored_root.and_then(|r| Sha256Hash::from_hex(r).ok());
    let mut proofs = BTreeMap::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (index, (item, meta)) in batch.items.iter().zip(&metas).enumerate() {
        let verified = match (&root, &meta.proof_path) {
            (Some(root), Some(path)) => verify_proof(&payload_leaves[index], path, root),
            _ => false,
        };

        let id = item_identifier(item, index);
        let count = seen.entry(id.clone()).or_insert(0);
        *count += 1;
        let key = if *count == 1 { id } else { format!("{id}#{count}") };
        proofs.insert(key, verified);
    }

    let (signature_ok, signature_error) = check_header_signature(batch);

    let ok = merkle_ok
        && leaves_ok
        && proofs.values().all(|v| *v)
        && signature_ok != Some(false);

    VerificationReceipt {
        batch_id: batch.batch_id.clone(),
        epoch_id: batch.epoch_id.clone(),
        item_count: batch.items.len(),
        merkle_root: batch.merkle_root.clone(),
        recomputed_root,
        merkle_ok,
        leaves_ok,
        proofs,
        signature_ok,
        signature_error,
        ok,
    }
}

fn check_header_signature(batch: &CollapseBatch) -> (Option<bool>, Option<String>) {
    match (batch.signer_pub.as_deref(), batch.signature.as_deref()) {
        (None, None) => (None, None),
        (Some(key), Some(signature)) => {
            let outcome = PublicKey::decode(key).and_then(|key| {
                let signature = Signature::decode(signature)?;
                key.verify(&batch.header_bytes(), &signature)
            });
            match outcome {
                Ok(()) => (Some(true), None),
                Err(e) => (Some(false), Some(e.to_string())),
            }
        }
        _ => (
            Some(false),
            Some("signer_pub and signature must both be present".into()),
        ),
    }
}

/// Seal `items` into a batch: fill each item's Merkle metadata, set the root,
/// and optionally sign the header.
///
/// Existing `merkle` fields are replaced. Every item must be a JSON object.
pub fn seal_batch(
    batch_id: impl Into<String>,
    epoch_id: impl Into<String>,
    items: Vec<Value>,
    signer: Option<&Keypair>,
) -> Result<CollapseBatch> {
    let mut objects: Vec<Map<String, Value>> = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(mut fields) => {
                fields.remove(MERKLE_FIELD);
                objects.push(fields);
            }
            _ => {
                return Err(CoreError::MalformedInput(format!(
                    "batch item {index} is not an object"
                )))
            }
        }
    }

    let leaves: Vec<Sha256Hash> = objects
        .iter()
        .map(|fields| leaf_hash(&Value::Object(fields.clone())))
        .collect();
    let tree = MerkleTree::build(leaves.clone());

    let mut sealed = Vec::with_capacity(objects.len());
    for (index, mut fields) in objects.into_iter().enumerate() {
        let meta = ItemMerkle {
            leaf_hash: Some(leaves[index].to_hex()),
            proof_path: tree.proof(index),
        };
        let meta = serde_json::to_value(meta).map_err(|e| CoreError::Serialization(e.to_string()))?;
        fields.insert(MERKLE_FIELD.into(), meta);
        sealed.push(Value::Object(fields));
    }

    let mut batch = CollapseBatch {
        batch_id: batch_id.into(),
        epoch_id: epoch_id.into(),
        items: sealed,
        merkle_root: tree.root().map(|r| r.to_hex()),
        signer_pub: None,
        signature: None,
    };

    if let Some(signer) = signer {
        batch.signer_pub = Some(signer.public_key().to_hex());
        batch.signature = Some(signer.sign(&batch.header_bytes()).to_hex());
    }
    Ok(batch)
}
