//! # Prove Subcommand
//!
//! Generates a zero-knowledge personality proof for a `bundle`-shaped input
//! with the circuit parameters from the configuration. Resource policy is
//! not consulted; use `attest bundle --zk` for the gated path.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use attest_core::ModelHash;
use attest_zkp::{ProofContext, ZkProof};

use crate::attest::BundleInput;
use crate::config::AttestConfig;

/// Arguments for `attest prove`.
#[derive(Args, Debug)]
pub struct ProveArgs {
    /// Analysis input JSON (same shape as `attest bundle`).
    #[arg(value_name = "FILE")]
    pub input: PathBuf,
    /// Write the proof here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// Abandon generation after this many ms.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

pub fn run_prove(args: &ProveArgs, config: &AttestConfig) -> Result<u8> {
    let input: BundleInput = crate::read_json(&args.input)?;
    let mut ctx = ProofContext::new();
    if let Some(ms) = args.timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }
    let proof = prove(&input, config, &ctx)?;
    crate::write_output(&proof, args.output.as_deref())?;
    Ok(0)
}

pub fn prove(input: &BundleInput, config: &AttestConfig, ctx: &ProofContext) -> Result<ZkProof> {
    let generator = config.proof_generator();
    tracing::info!(
        backend = generator.backend_name(),
        messages = input.messages.len(),
        "generating personality proof"
    );
    generator
        .generate_personality_proof(
            &input.messages,
            &input.result.personality_traits,
            &ModelHash::new(input.model_hash.clone()),
            ctx,
        )
        .context("proof generation failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(message_count: usize, confidence: f64) -> BundleInput {
        let messages: Vec<serde_json::Value> = (0..message_count)
            .map(|i| {
                serde_json::json!({
                    "id": format!("00000000-0000-4000-8000-{i:012}"),
                    "content": format!("message {i}"),
                    "timestamp": "2026-01-01T00:00:00Z",
                    "sender": "a",
                    "recipient": "b",
                    "direction": "incoming"
                })
            })
            .collect();
        serde_json::from_value(serde_json::json!({
            "modelHash": "m1",
            "result": {
                "personalityTraits": {
                    "openness": 0.4, "conscientiousness": 0.6, "extraversion": 0.5,
                    "agreeableness": 0.7, "neuroticism": 0.2, "confidence": confidence
                },
                "trustworthinessScore": {"score": 0.7, "factors": {}, "explanation": "steady"},
                "messageCount": message_count,
                "processingTimeMs": 5
            },
            "messages": messages
        }))
        .unwrap()
    }

    #[test]
    fn proof_verifies_under_same_config() {
        let config = AttestConfig::default();
        let proof = prove(&input(60, 0.8), &config, &ProofContext::new()).unwrap();
        assert!(config.proof_generator().verify_proof(&proof).is_valid);
    }

    #[test]
    fn too_few_messages_yields_invalid_proof() {
        let config = AttestConfig::default();
        let proof = prove(&input(10, 0.8), &config, &ProofContext::new()).unwrap();
        assert!(!config.proof_generator().verify_proof(&proof).is_valid);
    }

    #[test]
    fn lowered_minimum_from_config_applies() {
        let config = AttestConfig::from_yaml("zk:\n  min_messages: 5\n").unwrap();
        let proof = prove(&input(10, 0.8), &config, &ProofContext::new()).unwrap();
        assert_eq!(proof.public_inputs.message_bounds.min, 5);
        assert!(config.proof_generator().verify_proof(&proof).is_valid);
    }

    #[test]
    fn cancelled_context_aborts() {
        let ctx = ProofContext::new();
        ctx.cancellation_token().cancel();
        assert!(prove(&input(60, 0.8), &AttestConfig::default(), &ctx).is_err());
    }
}
