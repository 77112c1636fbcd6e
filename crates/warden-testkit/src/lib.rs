//! # Warden Testkit
//!
//! Testing utilities for Warden.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Canonical forms and digests pinned by an independent implementation
//! - **Generators**: Proptest strategies for JSON documents, leaves and ledgers
//! - **Fixtures**: Deterministic signers, signed manifests, ledgers and sealed batches
//!
//! ## Golden Vectors
//!
//! ```rust
//! use warden_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, digest) in verify_all_vectors() {
//!     assert!(matches, "{name}: {digest}");
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use warden_testkit::fixtures::{scenario_bindings, TestFixture};
//!
//! let fixture = TestFixture::new();
//! let manifest = fixture.signed_manifest(scenario_bindings(), serde_json::json!(0));
//! assert!(manifest["signatures"]["maker"].is_string());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{batch_items, scenario_bindings, write_manifest_files, TestFixture};
pub use generators::{json_object, json_value, leaves, reorder_keys, LedgerParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
