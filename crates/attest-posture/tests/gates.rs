//! # Security gate scenarios
//!
//! Real bundles from `attest-bundle` judged under different device postures.

use std::collections::BTreeMap;
use std::sync::Arc;

use attest_bundle::{BatchConfig, BatchManager, BatchVerificationManager, ChunkingBatchManager, CryptographicEngine};
use attest_core::{
    AnalysisResult, Message, MessageDirection, ModelHash, PersonalityTraits, Score, Timestamp,
    TrustworthinessScore,
};
use attest_crypto::LocalKeyProvider;
use attest_posture::{
    CheckContext, SecurityLevel, SecurityValidator, StaticEnvironment, VerificationDecision,
};

fn analysis(message_count: u64) -> AnalysisResult {
    AnalysisResult {
        personality_traits: PersonalityTraits {
            openness: Score(0.5),
            conscientiousness: Score(0.6),
            extraversion: Score(0.4),
            agreeableness: Score(0.7),
            neuroticism: Score(0.3),
            confidence: Score(0.85),
        },
        trustworthiness_score: TrustworthinessScore {
            score: Score(0.7),
            factors: BTreeMap::new(),
            explanation: String::new(),
        },
        message_count,
        processing_time_ms: 12,
    }
}

fn messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            Message::new(
                format!("note {i}"),
                Timestamp::from_epoch_secs(1_760_000_000 + i as i64).unwrap(),
                "friend",
                "owner",
                MessageDirection::Incoming,
            )
        })
        .collect()
}

fn engine() -> CryptographicEngine {
    CryptographicEngine::new(Arc::new(LocalKeyProvider::generate()))
}

#[test]
fn compromised_device_never_accepts_valid_bundle() {
    let bundle = engine()
        .create_verification_bundle(&analysis(5), &messages(5), &ModelHash::new("m1"))
        .unwrap();
    let validator = SecurityValidator::new(Arc::new(
        StaticEnvironment::new().with_tamper_indicator("system partition remounted rw"),
    ));

    let verdict = validator.validate_verification_bundle(&bundle, &CheckContext::new());
    assert!(verdict.is_valid);
    assert_eq!(verdict.posture.security_level, SecurityLevel::Compromised);
    assert_ne!(verdict.recommended_action, VerificationDecision::Accept);
}

#[test]
fn trusted_device_accepts_and_degraded_warns() {
    let bundle = engine()
        .create_verification_bundle(&analysis(5), &messages(5), &ModelHash::new("m1"))
        .unwrap();

    let trusted = SecurityValidator::new(Arc::new(StaticEnvironment::new()));
    assert_eq!(
        trusted.validate_verification_bundle(&bundle, &CheckContext::new()).recommended_action,
        VerificationDecision::Accept
    );

    let degraded = SecurityValidator::new(Arc::new(StaticEnvironment::new().with_debugger(true)));
    assert_eq!(
        degraded.validate_verification_bundle(&bundle, &CheckContext::new()).recommended_action,
        VerificationDecision::Warn
    );
}

#[test]
fn tampered_bundle_rejected_on_trusted_device() {
    let mut bundle = engine()
        .create_verification_bundle(&analysis(5), &messages(5), &ModelHash::new("m1"))
        .unwrap();
    bundle.model_hash = "m2".into();

    let validator = SecurityValidator::new(Arc::new(StaticEnvironment::new()));
    let verdict = validator.validate_verification_bundle(&bundle, &CheckContext::new());
    assert!(!verdict.is_valid);
    assert_eq!(verdict.recommended_action, VerificationDecision::Reject);
    assert_eq!(verdict.posture.security_level, SecurityLevel::Trusted);
}

#[test]
fn batch_bundle_goes_through_the_same_gate() {
    let manager = BatchVerificationManager::with_key_provider(Arc::new(LocalKeyProvider::generate()));
    let model = ModelHash::new("m1");
    let analyzed: Vec<_> = ChunkingBatchManager
        .create_batches(&messages(30), &BatchConfig { target_batch_size: 10 })
        .into_iter()
        .map(|b| {
            let r = analysis(b.messages.len() as u64);
            (b, r)
        })
        .collect();
    let proofs = manager.create_batch_proofs(&analyzed, &model).unwrap();
    let bundle = manager.aggregate_batch_proofs(proofs, &analysis(30), &model).unwrap();

    let trusted = SecurityValidator::new(Arc::new(StaticEnvironment::new()));
    assert_eq!(
        trusted.validate_batch_bundle(&bundle, &CheckContext::new()).recommended_action,
        VerificationDecision::Accept
    );

    let no_keys = SecurityValidator::new(Arc::new(StaticEnvironment::new().with_key_store(false)));
    assert_eq!(
        no_keys.validate_batch_bundle(&bundle, &CheckContext::new()).recommended_action,
        VerificationDecision::Reject
    );
}
