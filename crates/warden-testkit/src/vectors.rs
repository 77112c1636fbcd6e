//! Golden test vectors for deterministic verification.
//!
//! Expected values were produced by an independent JSON + SHA-256
//! implementation. Any implementation that hashes or signs Warden documents
//! must reproduce them byte for byte.

use serde_json::Value;
use warden_core::{canonicalize, digest_hex, merkle_root, Sha256Hash};

/// A golden canonicalization vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Input JSON as written.
    pub input: &'static str,
    /// Expected canonical form.
    pub canonical: &'static str,
    /// Expected SHA-256 of the canonical form (hex).
    pub sha256: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "flat object sorted",
            input: r#"{"b":2,"a":1}"#,
            canonical: r#"{"a":1,"b":2}"#,
            sha256: "43258cff783fe7036d8a43033f830adfc60ec037382473548ac742b888292777",
        },
        GoldenVector {
            name: "nested with null and array",
            input: r#"{"z":[3,1,{"y":null,"x":true}],"a":{"c":"s","b":false}}"#,
            canonical: r#"{"a":{"b":false,"c":"s"},"z":[3,1,{"x":true,"y":null}]}"#,
            sha256: "1aee75d7eae54a5216f4ea633fa21d7b9ed9e67aefff683acb8f545b9867f0ec",
        },
        GoldenVector {
            name: "integral float collapses",
            input: r#"{"n":1.0,"m":-2.50}"#,
            canonical: r#"{"m":-2.5,"n":1}"#,
            sha256: "87fb1f4fdb2a8eea78276386763e844f6be21ef0d1b71c81cf6cd4509e1c06e8",
        },
        GoldenVector {
            name: "large integral floats keep every digit",
            input: r#"{"neg":-1e20,"big":1e16}"#,
            canonical: r#"{"big":10000000000000000,"neg":-100000000000000000000}"#,
            sha256: "35506167bc7497d1114dca268fe3cb5309e5d7d4747ba8d83094058ad59f7cde",
        },
        GoldenVector {
            name: "unicode and escapes",
            input: r#"{"k":"é\n\"q\"\t✓"}"#,
            canonical: r#"{"k":"é\n\"q\"\t✓"}"#,
            sha256: "9d0cd7c78cfbc7ec7426938ac390cff360d2f37eb619095cc6e7a243fe5f3c78",
        },
        GoldenVector {
            name: "empty containers",
            input: r#"{"o":{},"a":[]}"#,
            canonical: r#"{"a":[],"o":{}}"#,
            sha256: "9bee7ebfc94b459dacb8cbc72cb2900e61f0aa42189df18329f84f92568f4f89",
        },
    ]
}

/// Leaves `sha256("a")`, `sha256("b")`, `sha256("c")` and their root.
///
/// The odd third leaf is paired with itself.
pub const MERKLE_ABC_LEAVES: [&str; 3] = [
    "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
    "3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d",
    "2e7d2c03a9507ae265ecf5b5356885a53393a2029d241394997265a1a25aefc6",
];

/// Expected root over [`MERKLE_ABC_LEAVES`].
pub const MERKLE_ABC_ROOT: &str =
    "d31a37ef6ac14a2db1470c4316beb5592e6afd4465022339adafda76a18ffabe";

/// Check every vector; returns `(name, matches, actual_digest)`.
///
/// Call this to verify your implementation matches the reference.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let (canonical, digest) = match serde_json::from_str::<Value>(v.input) {
                Ok(value) => (canonicalize(&value), digest_hex(&value)),
                Err(e) => (String::new(), format!("unparseable input: {e}")),
            };
            let matches = canonical == v.canonical && digest == v.sha256;
            (v.name.to_string(), matches, digest)
        })
        .collect()
}

/// Recompute the `abc` Merkle root.
pub fn merkle_abc_root() -> Option<String> {
    let leaves: Vec<Sha256Hash> = [b"a", b"b", b"c"]
        .iter()
        .map(|data| Sha256Hash::hash(*data))
        .collect();
    merkle_root(&leaves).map(|root| root.to_hex())
}
