//! Verify a collapse batch and print its verification receipt.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use warden_cli::{diff_fields, exit, init_logging, print_json, read_json, read_text, report_error};
use warden_core::{build_verification_receipt, CollapseBatch};

#[derive(Parser)]
#[command(name = "verify-batch")]
#[command(about = "Recompute a batch's Merkle root, proofs and signature", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the batch JSON file
    #[arg(long)]
    batch: PathBuf,

    /// Stored receipt to compare against; differing fields exit 3
    #[arg(long)]
    expect: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            exit::USAGE
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let text = read_text(&cli.batch)?;
    let batch = CollapseBatch::from_json(&text)
        .with_context(|| format!("{} is not a collapse batch", cli.batch.display()))?;

    // Load the fixture before printing anything so a bad --expect fails cleanly.
    let expected = cli.expect.as_deref().map(read_json).transpose()?;

    let receipt = build_verification_receipt(&batch);
    info!(
        batch_id = %receipt.batch_id,
        items = receipt.item_count,
        ok = receipt.ok,
        "Verified batch"
    );

    let actual = serde_json::to_value(&receipt)?;
    print_json(&actual)?;

    if let Some(expected) = expected {
        let mismatched = diff_fields(&expected, &actual);
        if !mismatched.is_empty() {
            warn!(fields = mismatched.len(), "Receipt differs from expectation");
            for field in &mismatched {
                eprintln!("mismatch: {field}");
            }
            return Ok(exit::MISMATCH);
        }
    }

    Ok(exit::OK)
}
