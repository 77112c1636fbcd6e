//! Compute the attestation hash of an authority manifest.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use warden_cli::{exit, init_logging, read_text, report_error};
use warden_gate::{sibling_path, AuthorityManifest};

#[derive(Parser)]
#[command(name = "hash-manifest")]
#[command(about = "Print the record digest of an authority manifest", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the manifest JSON file
    #[arg(long)]
    manifest: PathBuf,

    /// Also write the digest to the sibling `.hash` file
    #[arg(long)]
    write: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = match run(&cli) {
        Ok(()) => exit::OK,
        Err(e) => {
            report_error(&e);
            exit::USAGE
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let text = read_text(&cli.manifest)?;
    let manifest = AuthorityManifest::from_slice(text.as_bytes())
        .with_context(|| format!("{} is not an authority manifest", cli.manifest.display()))?;

    let hash = manifest.manifest_hash();

    let duo = manifest.verify_signatures();
    if !duo.ok {
        warn!(errors = ?duo.errors, "Manifest signatures do not verify");
    }

    if cli.write {
        let hash_path = sibling_path(&cli.manifest, "hash");
        fs::write(&hash_path, format!("{hash}\n"))
            .with_context(|| format!("cannot write {}", hash_path.display()))?;
        info!(path = %hash_path.display(), "Wrote manifest hash");
    }

    println!("{hash}");
    Ok(())
}
