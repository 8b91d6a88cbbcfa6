//! # Bundle and Batch Subcommands
//!
//! `attest bundle` runs the whole pipeline over one analyzed input: the
//! quick security gate, single-shot signing, posture validation, the upload
//! decision and (with `--zk`) a personality proof.
//!
//! `attest batch` signs batches that were analyzed individually upstream and
//! aggregates them under a Merkle root.
//!
//! Input for `bundle`:
//!
//! ```json
//! { "modelHash": "m1", "result": { ... }, "messages": [ ... ] }
//! ```
//!
//! Input for `batch`:
//!
//! ```json
//! { "modelHash": "m1", "result": { ... },
//!   "batches": [ { "messages": [ ... ], "result": { ... } } ] }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;

use attest_bundle::{batch_metadata, BatchVerificationManager};
use attest_core::{AnalysisResult, AttestError, BatchId, Message, MessageBatch, ModelHash};
use attest_pipeline::{AttestationPipeline, AttestationRequest, RunContext, UploadDecision};
use attest_posture::{HostEnvironment, HostMonitor, PerformanceOptimizer, SecurityValidator};

use crate::config::AttestConfig;
use crate::keys::load_key_provider;

/// Exit code when the bundle was produced but upload is blocked.
pub const EXIT_BLOCKED: u8 = 2;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundleInput {
    pub model_hash: String,
    pub result: AnalysisResult,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchInput {
    pub model_hash: String,
    /// Combined result over every batch.
    pub result: AnalysisResult,
    pub batches: Vec<AnalyzedBatch>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalyzedBatch {
    pub messages: Vec<Message>,
    pub result: AnalysisResult,
}

/// Arguments for `attest bundle`.
#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Analysis input JSON.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,
    /// Signing key file (hex seed). Defaults to `ATTEST_SIGNING_KEY`.
    #[arg(long)]
    pub key: Option<PathBuf>,
    /// Write the outcome here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// Also generate a zero-knowledge personality proof.
    #[arg(long)]
    pub zk: bool,
    /// Abandon posture checks and proof generation after this many ms.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Arguments for `attest batch`.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Batched analysis input JSON.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,
    /// Signing key file (hex seed). Defaults to `ATTEST_SIGNING_KEY`.
    #[arg(long)]
    pub key: Option<PathBuf>,
    /// Write the bundle here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub fn run_bundle(args: &BundleArgs, config: &AttestConfig) -> Result<u8> {
    let input: BundleInput = crate::read_json(&args.input)?;
    let keys = load_key_provider(args.key.as_deref())?;

    let security = SecurityValidator::with_thresholds(
        Arc::new(HostEnvironment::new(keys.clone())),
        config.security_thresholds(),
    );
    let performance =
        PerformanceOptimizer::new(Arc::new(HostMonitor::new()), config.performance_policy());
    let mut pipeline = AttestationPipeline::new(keys, security, performance)
        .with_config(config.pipeline_config());
    if args.zk {
        pipeline = pipeline.with_prover(config.proof_generator());
    }

    let mut ctx = RunContext::new();
    if let Some(ms) = args.timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    let threshold = config.batching.single_shot_threshold;
    let analyzer = move |_: &MessageBatch| -> Result<AnalysisResult, AttestError> {
        Err(AttestError::InvalidDataFormat(format!(
            "input exceeds {threshold} messages and needs per-batch results; use `attest batch`"
        )))
    };

    let model_hash = ModelHash::new(input.model_hash);
    let outcome = pipeline
        .attest(
            AttestationRequest {
                messages: &input.messages,
                analysis: &input.result,
                model_hash: &model_hash,
            },
            &analyzer,
            &ctx,
        )
        .context("attestation failed")?;

    crate::write_output(&outcome, args.output.as_deref())?;

    match &outcome.upload {
        UploadDecision::Allowed => Ok(0),
        UploadDecision::AllowedWithCaveat(caveat) => {
            tracing::warn!("upload allowed with caveat: {caveat}");
            Ok(0)
        }
        UploadDecision::Blocked(reason) => {
            tracing::error!("upload blocked: {reason}");
            Ok(EXIT_BLOCKED)
        }
    }
}

pub fn run_batch(args: &BatchArgs) -> Result<u8> {
    let input: BatchInput = crate::read_json(&args.input)?;
    let keys = load_key_provider(args.key.as_deref())?;

    SecurityValidator::new(Arc::new(HostEnvironment::new(keys.clone())))
        .require_quick_check()
        .context("device security gate")?;

    let bundle = aggregate(input, BatchVerificationManager::with_key_provider(keys))?;
    crate::write_output(&bundle, args.output.as_deref())?;
    Ok(0)
}

fn aggregate(
    input: BatchInput,
    manager: BatchVerificationManager,
) -> Result<attest_bundle::BatchVerificationBundle> {
    if input.batches.is_empty() {
        bail!("input contains no batches");
    }
    let total_batches = input.batches.len();
    let analyzed: Vec<(MessageBatch, AnalysisResult)> = input
        .batches
        .into_iter()
        .enumerate()
        .map(|(batch_index, b)| {
            let batch = MessageBatch {
                id: BatchId::new(),
                batch_index,
                total_batches,
                metadata: batch_metadata(&b.messages),
                messages: b.messages,
            };
            (batch, b.result)
        })
        .collect();

    let model_hash = ModelHash::new(input.model_hash);
    let proofs = manager
        .create_batch_proofs(&analyzed, &model_hash)
        .context("failed to prove batches")?;
    let bundle = manager
        .aggregate_batch_proofs(proofs, &input.result, &model_hash)
        .context("failed to aggregate batch proofs")?;
    Ok(bundle)
}
