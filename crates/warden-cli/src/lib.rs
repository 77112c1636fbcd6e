//! # Warden CLI
//!
//! Shared plumbing for the `verify-batch`, `verify-ledger` and
//! `hash-manifest` binaries.
//!
//! ## Exit Codes
//!
//! | Code | Meaning                                         |
//! |------|-------------------------------------------------|
//! | 0    | Verification ran (and, for ledgers, passed)     |
//! | 1    | Ledger integrity errors                         |
//! | 2    | Usage error or unreadable/malformed input       |
//! | 3    | Receipt differs from the `--expect` fixture     |
//!
//! Results go to stdout as JSON. Diagnostics and logs go to stderr;
//! set `RUST_LOG` to raise verbosity.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub mod exit {
    pub const OK: i32 = 0;
    pub const INTEGRITY: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const MISMATCH: i32 = 3;
}

/// Install a stderr subscriber filtered by `RUST_LOG` (default `warn`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init in the same process is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

pub fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

pub fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = read_text(path)?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Pretty-print a value to stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Top-level fields whose values differ between two JSON objects.
///
/// Keys present on only one side count as differing. The result is sorted.
/// A non-object on either side is reported as the single field `"$"`.
pub fn diff_fields(expected: &Value, actual: &Value) -> Vec<String> {
    let (Some(expected), Some(actual)) = (expected.as_object(), actual.as_object()) else {
        return if expected == actual {
            Vec::new()
        } else {
            vec!["$".to_string()]
        };
    };

    let mut keys: Vec<&String> = expected.keys().chain(actual.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter(|key| expected.get(key.as_str()) != actual.get(key.as_str()))
        .cloned()
        .collect()
}

/// Print an error chain the way every binary reports failures.
pub fn report_error(error: &anyhow::Error) {
    eprintln!("Error: {error:#}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_objects_have_no_diff() {
        let value = json!({"ok": true, "merkle_ok": true});
        assert!(diff_fields(&value, &value).is_empty());
    }

    #[test]
    fn changed_and_one_sided_fields_are_listed_sorted() {
        let expected = json!({"ok": true, "merkle_ok": true, "signature_ok": true});
        let actual = json!({"ok": false, "merkle_ok": true, "leaves_ok": false});
        assert_eq!(
            diff_fields(&expected, &actual),
            vec!["leaves_ok", "ok", "signature_ok"]
        );
    }

    #[test]
    fn nested_changes_surface_at_top_level() {
        let expected = json!({"proofs": {"a": true, "b": true}});
        let actual = json!({"proofs": {"a": true, "b": false}});
        assert_eq!(diff_fields(&expected, &actual), vec!["proofs"]);
    }

    #[test]
    fn non_objects_compare_whole() {
        assert_eq!(diff_fields(&json!([1]), &json!({})), vec!["$"]);
        assert!(diff_fields(&json!(1), &json!(1)).is_empty());
    }
}
