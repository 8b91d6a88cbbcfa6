//! # Pipeline runs
//!
//! Full runs with static device signals, so every gate outcome is
//! reproducible.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use attest_bundle::Attestation;
use attest_core::{
    AnalysisResult, AttestError, Message, MessageBatch, MessageDirection, ModelHash,
    PersonalityTraits, Score, Timestamp, TrustworthinessScore,
};
use attest_crypto::LocalKeyProvider;
use attest_pipeline::{
    AttestationPipeline, AttestationRequest, AttestedBundle, PipelineConfig, RunContext,
    UploadDecision, ZkOutcome,
};
use attest_posture::{
    DeferReason, DeviceCapabilities, DeviceClass, MemoryPressure, PerformanceOptimizer,
    PerformancePolicy, ProofLevel, SecurityValidator, StaticEnvironment, StaticMonitor,
    SystemStatus, ThermalState,
};
use attest_zkp::PersonalityProofGenerator;

fn analysis(message_count: u64) -> AnalysisResult {
    AnalysisResult {
        personality_traits: PersonalityTraits {
            openness: Score(0.62),
            conscientiousness: Score(0.55),
            extraversion: Score(0.48),
            agreeableness: Score(0.71),
            neuroticism: Score(0.26),
            confidence: Score(0.82),
        },
        trustworthiness_score: TrustworthinessScore {
            score: Score(0.74),
            factors: BTreeMap::from([("consistency".to_string(), Score(0.8))]),
            explanation: "Stable tone.".to_string(),
        },
        message_count,
        processing_time_ms: 40,
    }
}

fn messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            Message::new(
                format!("thread message {i} about dinner plans"),
                Timestamp::from_epoch_secs(1_760_000_000 + (i as i64) * 60).unwrap(),
                format!("contact-{}", i % 9),
                "owner",
                MessageDirection::Incoming,
            )
        })
        .collect()
}

fn status(thermal: ThermalState) -> SystemStatus {
    SystemStatus {
        device_capabilities: DeviceCapabilities {
            device_class: DeviceClass::High,
            cpu_cores: 8,
            total_memory_mb: 16_384,
        },
        battery_level: 0.8,
        is_charging: true,
        thermal_state: thermal,
        memory_pressure: MemoryPressure::Normal,
        low_power_mode: false,
    }
}

fn pipeline(env: StaticEnvironment, thermal: ThermalState) -> AttestationPipeline {
    AttestationPipeline::new(
        Arc::new(LocalKeyProvider::generate()),
        SecurityValidator::new(Arc::new(env)),
        PerformanceOptimizer::new(Arc::new(StaticMonitor(status(thermal))), PerformancePolicy::default()),
    )
    .with_prover(PersonalityProofGenerator::default())
}

fn per_batch(batch: &MessageBatch) -> Result<AnalysisResult, AttestError> {
    Ok(analysis(batch.messages.len() as u64))
}

#[test]
fn small_run_is_single_shot_with_proof() {
    let msgs = messages(120);
    let result = analysis(120);
    let model = ModelHash::new("m1");
    let outcome = pipeline(StaticEnvironment::new(), ThermalState::Nominal)
        .attest(
            AttestationRequest { messages: &msgs, analysis: &result, model_hash: &model },
            &per_batch,
            &RunContext::new(),
        )
        .unwrap();

    assert!(matches!(outcome.bundle, AttestedBundle::Single(_)));
    assert!(outcome.bundle.as_attestation().verify());
    assert_eq!(outcome.upload, UploadDecision::Allowed);
    match &outcome.zk {
        ZkOutcome::Generated { proof, level } => {
            assert_eq!(*level, ProofLevel::Full);
            assert!(proof.size_bytes > 0);
            assert!(PersonalityProofGenerator::default().verify_proof(proof).is_valid);
        }
        other => panic!("expected a proof, got {other:?}"),
    }
}

#[test]
fn large_run_is_batched_through_the_analyzer() {
    let msgs = messages(2_500);
    let result = analysis(2_500);
    let model = ModelHash::new("m1");
    let calls = AtomicUsize::new(0);
    let analyzer = |batch: &MessageBatch| {
        calls.fetch_add(1, Ordering::SeqCst);
        per_batch(batch)
    };

    let outcome = pipeline(StaticEnvironment::new(), ThermalState::Nominal)
        .with_config(PipelineConfig { single_shot_threshold: 1_000, target_batch_size: 1_000 })
        .attest(
            AttestationRequest { messages: &msgs, analysis: &result, model_hash: &model },
            &analyzer,
            &RunContext::new(),
        )
        .unwrap();

    let AttestedBundle::Batched(bundle) = &outcome.bundle else {
        panic!("expected a batched bundle");
    };
    assert_eq!(bundle.batch_proofs.len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(outcome.validation.is_valid);
    assert_eq!(outcome.upload, UploadDecision::Allowed);
}

#[test]
fn failed_quick_check_signs_nothing() {
    let msgs = messages(5);
    let result = analysis(5);
    let model = ModelHash::new("m1");
    let err = pipeline(StaticEnvironment::new().with_key_store(false), ThermalState::Nominal)
        .attest(
            AttestationRequest { messages: &msgs, analysis: &result, model_hash: &model },
            &per_batch,
            &RunContext::new(),
        )
        .unwrap_err();
    assert!(matches!(err, AttestError::DeviceCompromised(_)));
}

#[test]
fn degraded_device_uploads_with_caveat() {
    let msgs = messages(60);
    let result = analysis(60);
    let model = ModelHash::new("m1");
    let outcome = pipeline(StaticEnvironment::new().with_debugger(true), ThermalState::Nominal)
        .attest(
            AttestationRequest { messages: &msgs, analysis: &result, model_hash: &model },
            &per_batch,
            &RunContext::new(),
        )
        .unwrap();
    assert!(matches!(outcome.upload, UploadDecision::AllowedWithCaveat(ref r) if r.contains("debugger_detection")));
    assert!(matches!(outcome.zk, ZkOutcome::Generated { .. }));
}

#[test]
fn deferred_proof_never_blocks_the_bundle() {
    let msgs = messages(60);
    let result = analysis(60);
    let model = ModelHash::new("m1");
    let outcome = pipeline(StaticEnvironment::new(), ThermalState::Critical)
        .attest(
            AttestationRequest { messages: &msgs, analysis: &result, model_hash: &model },
            &per_batch,
            &RunContext::new(),
        )
        .unwrap();
    assert_eq!(outcome.upload, UploadDecision::Allowed);
    assert_eq!(outcome.zk, ZkOutcome::Deferred { reason: DeferReason::Thermal });
}

#[test]
fn cancelled_run_is_blocked_without_proof() {
    let msgs = messages(60);
    let result = analysis(60);
    let model = ModelHash::new("m1");
    let ctx = RunContext::new();
    ctx.cancellation_token().cancel();
    let outcome = pipeline(StaticEnvironment::new(), ThermalState::Nominal)
        .attest(
            AttestationRequest { messages: &msgs, analysis: &result, model_hash: &model },
            &per_batch,
            &ctx,
        )
        .unwrap();
    assert!(outcome.validation.is_valid);
    assert!(!outcome.upload.permits_upload());
    assert_eq!(outcome.zk, ZkOutcome::NotAttempted);
}

#[test]
fn analyzer_failure_propagates() {
    let msgs = messages(1_500);
    let result = analysis(1_500);
    let model = ModelHash::new("m1");
    let failing = |_: &MessageBatch| -> Result<AnalysisResult, AttestError> {
        Err(AttestError::InvalidDataFormat("analyzer returned no traits".into()))
    };
    let err = pipeline(StaticEnvironment::new(), ThermalState::Nominal)
        .attest(
            AttestationRequest { messages: &msgs, analysis: &result, model_hash: &model },
            &failing,
            &RunContext::new(),
        )
        .unwrap_err();
    assert!(matches!(err, AttestError::InvalidDataFormat(_)));
}
