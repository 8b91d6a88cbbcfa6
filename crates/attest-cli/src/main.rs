//! # attest CLI entry point
//!
//! Parses command-line arguments, loads configuration, sets up logging and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use attest_cli::attest::{run_batch, run_bundle, BatchArgs, BundleArgs};
use attest_cli::config::AttestConfig;
use attest_cli::keys::{run_keygen, KeygenArgs};
use attest_cli::posture::{run_posture, PostureArgs};
use attest_cli::proof::{run_prove, ProveArgs};
use attest_cli::verify::{run_verify, run_verify_proof, VerifyArgs, VerifyProofArgs};

/// Verifiable analysis attestation.
///
/// Signs analysis results, aggregates batch proofs under a Merkle root,
/// gates uploads on device posture and generates zero-knowledge
/// personality proofs.
#[derive(Parser, Debug)]
#[command(name = "attest", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 signing key.
    Keygen(KeygenArgs),

    /// Sign one analysis result and run the posture and proof gates.
    Bundle(BundleArgs),

    /// Prove pre-analyzed batches and aggregate them.
    Batch(BatchArgs),

    /// Verify a single or batched verification bundle.
    Verify(VerifyArgs),

    /// Report device security posture and resource status.
    Posture(PostureArgs),

    /// Generate a zero-knowledge personality proof.
    Prove(ProveArgs),

    /// Verify a zero-knowledge personality proof.
    #[command(name = "verify-proof")]
    VerifyProof(VerifyProofArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "attest CLI starting");

    let config = match AttestConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Keygen(args) => run_keygen(&args),
        Commands::Bundle(args) => run_bundle(&args, &config),
        Commands::Batch(args) => run_batch(&args),
        Commands::Verify(args) => run_verify(&args),
        Commands::Posture(args) => run_posture(&args, &config),
        Commands::Prove(args) => run_prove(&args, &config),
        Commands::VerifyProof(args) => run_verify_proof(&args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_keygen_defaults() {
        let cli = Cli::try_parse_from(["attest", "keygen"]).unwrap();
        let Commands::Keygen(args) = cli.command else {
            panic!("expected keygen");
        };
        assert_eq!(args.prefix, "attest");
        assert_eq!(args.output, PathBuf::from("."));
        assert!(!args.force);
    }

    #[test]
    fn cli_parse_bundle_with_zk_and_timeout() {
        let cli = Cli::try_parse_from([
            "attest", "bundle", "in.json", "--key", "dev.key", "--zk", "--timeout-ms", "500",
        ])
        .unwrap();
        let Commands::Bundle(args) = cli.command else {
            panic!("expected bundle");
        };
        assert_eq!(args.input, PathBuf::from("in.json"));
        assert_eq!(args.key, Some(PathBuf::from("dev.key")));
        assert!(args.zk);
        assert_eq!(args.timeout_ms, Some(500));
    }

    #[test]
    fn cli_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["attest", "verify", "b.json", "-vv", "--config", "a.yaml"])
                .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("a.yaml")));
        assert!(matches!(cli.command, Commands::Verify(_)));
    }

    #[test]
    fn cli_parse_verify_proof_name() {
        let cli = Cli::try_parse_from(["attest", "verify-proof", "p.json"]).unwrap();
        assert!(matches!(cli.command, Commands::VerifyProof(_)));
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["attest"]).is_err());
    }

    #[test]
    fn cli_bundle_requires_input() {
        assert!(Cli::try_parse_from(["attest", "bundle"]).is_err());
    }
}
