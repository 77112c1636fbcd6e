//! # Warden Core
//!
//! Pure verification primitives for Warden: canonical JSON, SHA-256 digests,
//! Merkle proofs, Ed25519 dual signatures, hash-chained ledgers and batch
//! receipts.
//!
//! This crate contains no I/O and no logging. Every verification entry point
//! returns a structured result instead of an error, so a single pass reports
//! every defect it finds.
//!
//! ## Key Types
//!
//! - [`Sha256Hash`] - Digest of a canonical document
//! - [`MerkleTree`] / [`ProofStep`] - Batch roots and inclusion proofs
//! - [`DuoVerification`] - Maker/checker signature outcome
//! - [`LedgerEntry`] / [`LedgerReport`] - Chained ledger and its defects
//! - [`CollapseBatch`] / [`VerificationReceipt`] - Sealed batch and its receipt
//!
//! ## Canonicalization
//!
//! Everything hashed or signed goes through [`canonicalize`] first. See the
//! [`canonical`] module for the encoding rules.

pub mod batch;
pub mod canonical;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod ledger;
pub mod merkle;

pub use batch::{
    build_verification_receipt, item_identifier, seal_batch, CollapseBatch, ItemMerkle,
    VerificationReceipt,
};
pub use canonical::{canonical_bytes, canonicalize, canonicalize_serializable};
pub use crypto::{
    decode_public_key, decode_signature, verify, verify_duo, DuoKeys, DuoVerification, Keypair,
    PublicKey, Signature, SignerRole, SignerStatus,
};
pub use digest::{
    digest, digest_hex, hex_eq, record_digest, record_digest_hex, strip_self_references,
    Sha256Hash,
};
pub use error::{CoreError, LedgerParseError, Result};
pub use ledger::{
    compute_entry_hash, parse_ledger, to_ndjson, verify_entry_signature, verify_ledger,
    IssueKind, LedgerEntry, LedgerIssue, LedgerReport, LedgerWriter,
};
pub use merkle::{
    hash_pair, leaf_hash, merkle_root, merkle_root_hex, verify_proof, verify_proof_hex,
    MerkleTree, Position, ProofStep,
};
