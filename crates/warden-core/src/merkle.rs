//! Binary SHA-256 Merkle trees.
//!
//! ## Construction
//!
//! Leaves are 32-byte digests. Each level pairs adjacent nodes and hashes
//! `left || right` over the raw bytes. An odd node at the end of a level is
//! paired with itself. The root of a single leaf is the leaf; an empty tree
//! has no root.
//!
//! ## Proofs
//!
//! A proof lists one [`ProofStep`] per level, from the leaf up. Each step
//! names the sibling hash and the side the sibling sits on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::{digest, strip_fields, Sha256Hash};
use crate::error::Result;

/// Field on a batch item holding its Merkle metadata.
pub const MERKLE_FIELD: &str = "merkle";

/// Side of the sibling relative to the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

/// One level of an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub position: Position,
    pub hash: String,
}

/// Hash two child nodes into their parent.
pub fn hash_pair(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    Sha256Hash::concat(left, right)
}

/// Leaf digest of a batch item: the item's digest without its `merkle` field.
pub fn leaf_hash(item: &Value) -> Sha256Hash {
    digest(&strip_fields(item, &[MERKLE_FIELD]))
}

/// Root over `leaves`, or `None` when there are none.
pub fn merkle_root(leaves: &[Sha256Hash]) -> Option<Sha256Hash> {
    MerkleTree::build(leaves.to_vec()).root()
}

/// Root over hex-encoded leaves.
pub fn merkle_root_hex(leaves: &[String]) -> Result<Option<String>> {
    let leaves = leaves
        .iter()
        .map(|l| Sha256Hash::from_hex(l))
        .collect::<Result<Vec<_>>>()?;
    Ok(merkle_root(&leaves).map(|root| root.to_hex()))
}

/// Check that `proof` leads from `leaf` to `root`.
///
/// A step whose hash does not decode fails the proof.
pub fn verify_proof(leaf: &Sha256Hash, proof: &[ProofStep], root: &Sha256Hash) -> bool {
    let mut acc = *leaf;
    for step in proof {
        let Ok(sibling) = Sha256Hash::from_hex(&step.hash) else {
            return false;
        };
        acc = match step.position {
            Position::Left => hash_pair(&sibling, &acc),
            Position::Right => hash_pair(&acc, &sibling),
        };
    }
    acc == *root
}

/// [`verify_proof`] over hex-encoded leaf and root.
pub fn verify_proof_hex(leaf: &str, proof: &[ProofStep], root: &str) -> bool {
    match (Sha256Hash::from_hex(leaf), Sha256Hash::from_hex(root)) {
        (Ok(leaf), Ok(root)) => verify_proof(&leaf, proof, &root),
        _ => false,
    }
}

/// A fully materialized tree, kept level by level for proof generation.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaves, the last level holds the root.
    levels: Vec<Vec<Sha256Hash>>,
}

impl MerkleTree {
    pub fn build(leaves: Vec<Sha256Hash>) -> Self {
        let mut levels = vec![leaves];
        while levels.last().map_or(false, |level| level.len() > 1) {
            let current = &levels[levels.len() - 1];
            let next = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    _ => hash_pair(&pair[0], &pair[0]),
                })
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    pub fn root(&self) -> Option<Sha256Hash> {
        self.levels.last().and_then(|level| level.first()).copied()
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn leaves(&self) -> &[Sha256Hash] {
        &self.levels[0]
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.len() {
            return None;
        }

        let mut steps = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut i = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let step = if i % 2 == 0 {
                // Odd tail pairs with itself.
                let sibling = level.get(i + 1).unwrap_or(&level[i]);
                ProofStep {
                    position: Position::Right,
                    hash: sibling.to_hex(),
                }
            } else {
                ProofStep {
                    position: Position::Left,
                    hash: level[i - 1].to_hex(),
                }
            };
            steps.push(step);
            i /= 2;
        }
        Some(steps)
    }
}
