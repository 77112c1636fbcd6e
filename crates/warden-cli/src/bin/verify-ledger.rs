//! Verify a hash-chained, signed NDJSON (or JSON array) ledger.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use warden_cli::{exit, init_logging, print_json, read_text, report_error};
use warden_core::{decode_public_key, parse_ledger, verify_ledger, LedgerIssue};

#[derive(Parser)]
#[command(name = "verify-ledger")]
#[command(about = "Check hashes, chain links and signatures of a ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the ledger file
    #[arg(long)]
    ledger: PathBuf,

    /// Ed25519 public key of the ledger signer (hex or base64)
    #[arg(long = "public-key")]
    public_key: String,
}

#[derive(Serialize)]
struct LedgerOutput<'a> {
    ok: bool,
    entries: usize,
    errors: Vec<String>,
    issues: &'a [LedgerIssue],
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
    // An undecodable key is a usage error here, not N signature failures.
    decode_public_key(&cli.public_key).context("--public-key is not a valid Ed25519 key")?;

    let text = read_text(&cli.ledger)?;
    let entries = parse_ledger(&text)
        .with_context(|| format!("{} is not a ledger", cli.ledger.display()))?;

    let report = verify_ledger(&entries, &cli.public_key);
    info!(entries = entries.len(), issues = report.errors.len(), "Verified ledger");

    print_json(&LedgerOutput {
        ok: report.ok,
        entries: entries.len(),
        errors: report.messages(),
        issues: &report.errors,
    })?;

    Ok(if report.ok { exit::OK } else { exit::INTEGRITY })
}
