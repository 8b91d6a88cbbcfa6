//! # Attestation Pipeline
//!
//! One call from a finished analysis to an upload decision:
//!
//! 1. **Pre-flight**: the quick security check. Failure is
//!    `DeviceCompromised` and nothing is signed.
//! 2. **Bundle**: inputs up to `single_shot_threshold` messages get a single
//!    [`VerificationBundle`]. Larger inputs are partitioned by the
//!    [`BatchManager`], analyzed per batch by the caller's [`BatchAnalyzer`],
//!    proved in parallel and aggregated.
//! 3. **Gate**: full device posture plus bundle verification yield an
//!    [`UploadDecision`].
//! 4. **ZK**: proof generation runs only when the performance optimizer
//!    says proceed. Deferral, skip and failure are recorded in [`ZkOutcome`]
//!    and never withhold the bundle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use attest_bundle::{
    Attestation, BatchConfig, BatchManager, BatchVerificationBundle, BatchVerificationManager,
    ChunkingBatchManager, VerificationBundle,
};
use attest_core::{AnalysisResult, AttestError, Message, MessageBatch, ModelHash};
use attest_crypto::KeyProvider;
use attest_posture::{
    BundleValidation, CheckContext, DeferReason, PerformanceOptimizer, ProofLevel,
    SecurityValidator, SkipReason, VerificationDecision, ZkpDecision,
};
use attest_zkp::{PersonalityProofGenerator, ProofContext, ZkProof};

/// Analysis engine seam: one result per batch.
pub trait BatchAnalyzer: Send + Sync {
    fn analyze_batch(&self, batch: &MessageBatch) -> Result<AnalysisResult, AttestError>;
}

impl<F> BatchAnalyzer for F
where
    F: Fn(&MessageBatch) -> Result<AnalysisResult, AttestError> + Send + Sync,
{
    fn analyze_batch(&self, batch: &MessageBatch) -> Result<AnalysisResult, AttestError> {
        self(batch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Largest input signed as a single bundle.
    pub single_shot_threshold: usize,
    /// Requested batch size before device scaling.
    pub target_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            single_shot_threshold: 1_000,
            target_batch_size: 1_000,
        }
    }
}

/// Input to one attestation run.
#[derive(Debug, Clone, Copy)]
pub struct AttestationRequest<'a> {
    pub messages: &'a [Message],
    /// Combined result over all messages.
    pub analysis: &'a AnalysisResult,
    pub model_hash: &'a ModelHash,
}

/// Cancellation and deadline shared by posture checks and proof generation.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn check_context(&self) -> CheckContext {
        let ctx = CheckContext::new().with_cancellation(self.cancel.clone());
        match self.deadline {
            Some(d) => ctx.with_deadline(d),
            None => ctx,
        }
    }

    fn proof_context(&self) -> ProofContext {
        let ctx = ProofContext::new().with_cancellation(self.cancel.clone());
        match self.deadline {
            Some(d) => ctx.with_deadline(d),
            None => ctx,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttestedBundle {
    Single(VerificationBundle),
    Batched(BatchVerificationBundle),
}

impl AttestedBundle {
    pub fn as_attestation(&self) -> &dyn Attestation {
        match self {
            Self::Single(b) => b,
            Self::Batched(b) => b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "camelCase")]
pub enum UploadDecision {
    Allowed,
    /// May upload; the caveat must be shown to the user.
    AllowedWithCaveat(String),
    Blocked(String),
}

impl UploadDecision {
    pub fn permits_upload(&self) -> bool {
        !matches!(self, Self::Blocked(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ZkOutcome {
    Generated { proof: ZkProof, level: ProofLevel },
    Deferred { reason: DeferReason },
    Skipped { reason: SkipReason },
    Failed { error: String },
    /// No prover configured, or the bundle was blocked.
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationOutcome {
    pub bundle: AttestedBundle,
    pub validation: BundleValidation,
    pub upload: UploadDecision,
    pub zk: ZkOutcome,
}

/// Wires the bundle, posture and proof components into one run.
pub struct AttestationPipeline {
    manager: BatchVerificationManager,
    batcher: Arc<dyn BatchManager>,
    security: SecurityValidator,
    performance: PerformanceOptimizer,
    prover: Option<PersonalityProofGenerator>,
    config: PipelineConfig,
}

impl std::fmt::Debug for AttestationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationPipeline")
            .field("config", &self.config)
            .field("zk_enabled", &self.prover.is_some())
            .finish_non_exhaustive()
    }
}

impl AttestationPipeline {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        security: SecurityValidator,
        performance: PerformanceOptimizer,
    ) -> Self {
        Self {
            manager: BatchVerificationManager::with_key_provider(keys),
            batcher: Arc::new(ChunkingBatchManager::new()),
            security,
            performance,
            prover: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_batch_manager(mut self, batcher: Arc<dyn BatchManager>) -> Self {
        self.batcher = batcher;
        self
    }

    /// Enable zero-knowledge proofs.
    pub fn with_prover(mut self, prover: PersonalityProofGenerator) -> Self {
        self.prover = Some(prover);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn attest(
        &self,
        request: AttestationRequest<'_>,
        analyzer: &dyn BatchAnalyzer,
        ctx: &RunContext,
    ) -> Result<AttestationOutcome, AttestError> {
        self.security.require_quick_check()?;

        let bundle = self.create_bundle(&request, analyzer)?;

        let validation = self
            .security
            .validate_attestation(bundle.as_attestation(), &ctx.check_context());
        let upload = upload_decision(&validation);

        let zk = if upload.permits_upload() {
            self.run_zk(&request, ctx)
        } else {
            ZkOutcome::NotAttempted
        };

        tracing::info!(
            kind = %bundle.as_attestation().kind(),
            messages = request.messages.len(),
            action = %validation.recommended_action,
            zk = zk_label(&zk),
            "attestation run complete"
        );

        Ok(AttestationOutcome {
            bundle,
            validation,
            upload,
            zk,
        })
    }

    fn create_bundle(
        &self,
        request: &AttestationRequest<'_>,
        analyzer: &dyn BatchAnalyzer,
    ) -> Result<AttestedBundle, AttestError> {
        if request.messages.len() <= self.config.single_shot_threshold {
            let bundle = self.manager.engine().create_verification_bundle(
                request.analysis,
                request.messages,
                request.model_hash,
            )?;
            return Ok(AttestedBundle::Single(bundle));
        }

        let target_batch_size = self
            .performance
            .calculate_optimal_batch_size(self.config.target_batch_size);
        let batches = self
            .batcher
            .create_batches(request.messages, &BatchConfig { target_batch_size });
        if batches.is_empty() {
            return Err(AttestError::EmptyInput("batch manager produced no batches".into()));
        }
        tracing::debug!(batches = batches.len(), target_batch_size, "input partitioned");

        let analyzed = batches
            .into_iter()
            .map(|batch| {
                let result = analyzer.analyze_batch(&batch)?;
                Ok((batch, result))
            })
            .collect::<Result<Vec<_>, AttestError>>()?;

        let proofs = self.manager.create_batch_proofs(&analyzed, request.model_hash)?;
        let bundle =
            self.manager
                .aggregate_batch_proofs(proofs, request.analysis, request.model_hash)?;
        Ok(AttestedBundle::Batched(bundle))
    }

    fn run_zk(&self, request: &AttestationRequest<'_>, ctx: &RunContext) -> ZkOutcome {
        let Some(prover) = &self.prover else {
            return ZkOutcome::NotAttempted;
        };
        match self.performance.should_perform_zkp_generation() {
            ZkpDecision::Proceed(level) => match prover.generate_personality_proof(
                request.messages,
                &request.analysis.personality_traits,
                request.model_hash,
                &ctx.proof_context(),
            ) {
                Ok(proof) => ZkOutcome::Generated { proof, level },
                Err(e) => ZkOutcome::Failed {
                    error: AttestError::from(e).to_string(),
                },
            },
            ZkpDecision::DeferUntilLater(reason) => ZkOutcome::Deferred { reason },
            ZkpDecision::Skip(reason) => ZkOutcome::Skipped { reason },
        }
    }
}

fn upload_decision(validation: &BundleValidation) -> UploadDecision {
    let failed: Vec<&str> = validation
        .posture
        .failed_checks()
        .map(|c| c.name.as_str())
        .collect();
    match validation.recommended_action {
        VerificationDecision::Accept => UploadDecision::Allowed,
        VerificationDecision::Warn => UploadDecision::AllowedWithCaveat(format!(
            "device posture is {} (failed checks: {})",
            validation.posture.security_level,
            failed.join(", ")
        )),
        VerificationDecision::Reject if !validation.is_valid => {
            UploadDecision::Blocked("bundle failed verification".into())
        }
        VerificationDecision::Reject => UploadDecision::Blocked(format!(
            "device posture is {} (failed checks: {})",
            validation.posture.security_level,
            failed.join(", ")
        )),
    }
}

fn zk_label(outcome: &ZkOutcome) -> &'static str {
    match outcome {
        ZkOutcome::Generated { .. } => "generated",
        ZkOutcome::Deferred { .. } => "deferred",
        ZkOutcome::Skipped { .. } => "skipped",
        ZkOutcome::Failed { .. } => "failed",
        ZkOutcome::NotAttempted => "not_attempted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_posture::{SecurityCheck, SecurityLevel, SecurityPosture};

    fn validation(action: VerificationDecision, is_valid: bool, failed: &[&str]) -> BundleValidation {
        BundleValidation {
            is_valid,
            recommended_action: action,
            posture: SecurityPosture {
                security_level: SecurityLevel::Degraded,
                checks: failed
                    .iter()
                    .map(|name| SecurityCheck {
                        name: name.to_string(),
                        passed: false,
                        weight: 0.1,
                        critical: false,
                        detail: None,
                    })
                    .collect(),
                overall_score: 0.7,
                validation_time: Duration::from_millis(1),
            },
        }
    }

    #[test]
    fn test_accept_allows_upload() {
        let d = upload_decision(&validation(VerificationDecision::Accept, true, &[]));
        assert_eq!(d, UploadDecision::Allowed);
        assert!(d.permits_upload());
    }

    #[test]
    fn test_warn_carries_failed_checks() {
        let d = upload_decision(&validation(
            VerificationDecision::Warn,
            true,
            &["debugger_detection", "emulator_detection"],
        ));
        match d {
            UploadDecision::AllowedWithCaveat(reason) => {
                assert!(reason.contains("degraded"));
                assert!(reason.contains("debugger_detection, emulator_detection"));
            }
            other => panic!("expected caveat, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_bundle_blocks_with_its_own_reason() {
        let d = upload_decision(&validation(VerificationDecision::Reject, false, &[]));
        assert_eq!(d, UploadDecision::Blocked("bundle failed verification".into()));
        assert!(!d.permits_upload());
    }

    #[test]
    fn test_decision_wire_shape() {
        let json = serde_json::to_value(UploadDecision::Blocked("x".into())).unwrap();
        assert_eq!(json["decision"], "blocked");
        assert_eq!(json["reason"], "x");
        let json = serde_json::to_value(ZkOutcome::NotAttempted).unwrap();
        assert_eq!(json["status"], "notAttempted");
    }
}
