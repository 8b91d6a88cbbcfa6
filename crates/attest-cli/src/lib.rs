//! # attest-cli
//!
//! The `attest` command-line interface over the attestation pipeline.
//!
//! ## Subcommands
//!
//! - `attest keygen` writes a hex Ed25519 seed and its public key.
//! - `attest bundle` runs the full pipeline over one analysis input.
//! - `attest batch` proves pre-analyzed batches and aggregates them.
//! - `attest verify` checks a single or batched verification bundle.
//! - `attest posture` reports device security and resource state.
//! - `attest prove` / `attest verify-proof` generate and check
//!   zero-knowledge personality proofs.
//!
//! The signing key comes from `--key <file>` (64 hex chars) or, when
//! absent, from the `ATTEST_SIGNING_KEY` environment variable.
//!
//! ```bash
//! attest keygen --prefix device
//! attest bundle --key device.key analysis.json -o bundle.json
//! attest verify bundle.json
//! ```

pub mod attest;
pub mod config;
pub mod keys;
pub mod posture;
pub mod proof;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read and parse a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Pretty-print `value` to `output`, or to stdout when no path is given.
pub fn write_output<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
