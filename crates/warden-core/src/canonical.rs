//! Canonical JSON encoding for deterministic hashing and signing.
//!
//! Rules:
//! - Object keys sorted by code point, no duplicate keys
//! - Arrays keep their order
//! - No insignificant whitespace
//! - Integral floats are written as exact integers (`1.0` -> `1`, `1e16` ->
//!   `10000000000000000`), never in exponent form
//! - Strings escape only `"`, `\` and control characters
//!
//! Absent values never reach this module: typed records skip `None` fields
//! at serialization time, and JSON `null` is a value like any other.
//!
//! **CRITICAL**: This encoding is FROZEN. Every participating implementation
//! must produce the same bytes or digests and signatures stop matching.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::{CoreError, Result};

/// Canonicalize a JSON value to its canonical string form.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonical UTF-8 bytes of a JSON value.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonicalize(value).into_bytes()
}

/// Canonicalize any serializable record.
///
/// Conversion to a JSON value is the only fallible step.
pub fn canonicalize_serializable<T: Serialize + ?Sized>(record: &T) -> Result<String> {
    let value =
        serde_json::to_value(record).map_err(|e| CoreError::Serialization(e.to_string()))?;
    Ok(canonicalize(&value))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map),
    }
}

fn write_object(out: &mut String, map: &Map<String, Value>) {
    // serde_json may be built with `preserve_order`, so never rely on the
    // map's own iteration order.
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

fn write_number(out: &mut String, n: &Number) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        if f == 0.0 {
            out.push('0');
        } else if f.is_finite() && f.fract() == 0.0 {
            // Fixed-precision formatting prints every digit of the value.
            out.push_str(&format!("{f:.0}"));
        } else {
            out.push_str(&n.to_string());
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sorts_keys_recursively() {
        let value = json!({"b": 1, "a": {"d": [3, 1], "c": null}});
        assert_eq!(canonicalize(&value), r#"{"a":{"c":null,"d":[3,1]},"b":1}"#);
    }

    #[test]
    fn test_key_order_invariant() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":{"q":true,"p":"s"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y":{"p":"s","q":true},"x":1}"#).unwrap();
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn test_arrays_keep_order() {
        assert_eq!(canonicalize(&json!([3, "a", 1])), r#"[3,"a",1]"#);
        assert_ne!(canonicalize(&json!([1, 2])), canonicalize(&json!([2, 1])));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(canonicalize(&json!(null)), "null");
        assert_eq!(canonicalize(&json!(true)), "true");
        assert_eq!(canonicalize(&json!(-17)), "-17");
        assert_eq!(canonicalize(&json!(u64::MAX)), "18446744073709551615");
        assert_eq!(canonicalize(&json!(1.5)), "1.5");
    }

    #[test]
    fn test_integral_floats_collapse() {
        assert_eq!(canonicalize(&json!(1.0)), "1");
        assert_eq!(canonicalize(&json!(-0.0)), "0");
        assert_eq!(canonicalize(&json!({"n": 42.0})), canonicalize(&json!({"n": 42})));
    }

    #[test]
    fn test_large_integral_floats_use_exact_digits() {
        assert_eq!(canonicalize(&json!(1e16)), "10000000000000000");
        assert_eq!(canonicalize(&json!(-2.5e18)), "-2500000000000000000");
        assert_eq!(canonicalize(&json!(1e20)), "100000000000000000000");
        assert_eq!(
            canonicalize(&json!(2f64.powi(70))),
            "1180591620717411303424"
        );
        assert_eq!(canonicalize(&json!(1.5e-7)), "1.5e-7");
    }

    #[test]
    fn test_string_escaping() {
        let value = json!("quote\" slash\\ nl\n tab\t bell\u{07} é ✓");
        assert_eq!(
            canonicalize(&value),
            "\"quote\\\" slash\\\\ nl\\n tab\\t bell\\u0007 é ✓\""
        );
    }

    #[test]
    fn test_keys_sort_by_code_point() {
        let value = json!({"b": 0, "B": 0, "é": 0, "a": 0, "10": 0, "9": 0});
        assert_eq!(
            canonicalize(&value),
            r#"{"10":0,"9":0,"B":0,"a":0,"b":0,"é":0}"#
        );
    }

    #[test]
    fn test_serializable_skips_absent_fields() {
        #[derive(Serialize)]
        struct Record {
            z: u8,
            #[serde(skip_serializing_if = "Option::is_none")]
            absent: Option<u8>,
            a: Option<u8>,
        }

        let out = canonicalize_serializable(&Record {
            z: 1,
            absent: None,
            a: None,
        })
        .unwrap();
        assert_eq!(out, r#"{"a":null,"z":1}"#);
    }
}
