//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use warden_core::{Keypair, Sha256Hash};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random digest to use as a Merkle leaf.
pub fn leaf() -> impl Strategy<Value = Sha256Hash> {
    any::<[u8; 32]>().prop_map(Sha256Hash::from_bytes)
}

/// Generate between 1 and `max` leaves.
pub fn leaves(max: usize) -> impl Strategy<Value = Vec<Sha256Hash>> {
    prop::collection::vec(leaf(), 1..=max)
}

/// Generate an object key, including non-ASCII and escape-worthy ones.
pub fn key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z_][a-zA-Z0-9_]{0,8}",
        "[\\PC]{0,6}",
        Just("\"quoted\"".to_string()),
        Just("line\nbreak".to_string()),
    ]
}

/// Generate an arbitrary JSON value of bounded depth and width.
pub fn json_value() -> impl Strategy<Value = Value> {
    let scalar = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e6f64..1.0e6f64).prop_map(Value::from),
        "[\\PC]{0,12}".prop_map(Value::String),
    ];
    scalar.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(key(), inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Generate a JSON object.
pub fn json_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key(), json_value(), 0..8)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

/// Reverse the key insertion order of every object, recursively.
///
/// The result is structurally equal to the input.
pub fn reorder_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.reverse();
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), reorder_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(reorder_keys).collect()),
        other => other.clone(),
    }
}

/// Parameters for generating a ledger.
#[derive(Debug, Clone)]
pub struct LedgerParams {
    pub seed: [u8; 32],
    pub contents: Vec<Value>,
}

impl Arbitrary for LedgerParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<[u8; 32]>(), prop::collection::vec(json_object(), 1..8))
            .prop_map(|(seed, contents)| LedgerParams { seed, contents })
            .boxed()
    }
}
