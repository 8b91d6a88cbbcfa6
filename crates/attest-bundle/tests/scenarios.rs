//! # End-to-end bundle scenarios
//!
//! Exercises the public API the way the pipeline and the CLI use it:
//! a small single-shot bundle, a large batched run through the reference
//! Batch Manager, and the wire round trip a remote verifier would see.

use std::collections::BTreeMap;
use std::sync::Arc;

use attest_bundle::{
    Attestation, BatchConfig, BatchManager, BatchVerificationBundle, BatchVerificationManager,
    ChunkingBatchManager, CryptographicEngine, VerificationBundle,
};
use attest_core::{
    AnalysisResult, Message, MessageDirection, ModelHash, PersonalityTraits, Score, Timestamp,
    TrustworthinessScore,
};
use attest_crypto::{Ed25519KeyPair, LocalKeyProvider, RotatingKeyHandle};

fn analysis(message_count: u64) -> AnalysisResult {
    AnalysisResult {
        personality_traits: PersonalityTraits {
            openness: Score(0.72),
            conscientiousness: Score(0.64),
            extraversion: Score(0.41),
            agreeableness: Score(0.83),
            neuroticism: Score(0.22),
            confidence: Score(0.9),
        },
        trustworthiness_score: TrustworthinessScore {
            score: Score(0.78),
            factors: BTreeMap::from([
                ("consistency".to_string(), Score(0.8)),
                ("responsiveness".to_string(), Score(0.7)),
            ]),
            explanation: "Consistent tone across conversations.".to_string(),
        },
        message_count,
        processing_time_ms: 350,
    }
}

fn messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            let direction = if i % 2 == 0 {
                MessageDirection::Incoming
            } else {
                MessageDirection::Outgoing
            };
            Message::new(
                format!("conversation line {i} about weekend planning"),
                Timestamp::from_epoch_secs(1_760_000_000 + (i as i64) * 30).unwrap(),
                format!("contact-{}", i % 13),
                "owner",
                direction,
            )
        })
        .collect()
}

#[test]
fn five_message_bundle_with_model_m1() {
    let engine = CryptographicEngine::new(Arc::new(LocalKeyProvider::generate()));
    let bundle = engine
        .create_verification_bundle(&analysis(5), &messages(5), &ModelHash::new("m1"))
        .expect("bundle");

    assert!(!bundle.signature.is_empty());
    assert!(!bundle.public_key.is_empty());
    assert!(!bundle.input_hash.is_empty());
    assert!(!bundle.result_hash.is_empty());
    assert_eq!(bundle.model_hash, "m1");
    assert!(bundle.is_valid());
    assert!(bundle.verify());
}

#[test]
fn six_thousand_messages_batch_and_verify() {
    let all = messages(6_000);
    let batches = ChunkingBatchManager
        .create_batches(&all, &BatchConfig { target_batch_size: 1_000 });
    assert!(batches.len() >= 6);
    assert!(batches.iter().all(|b| b.messages.len() <= 1_000));

    let manager = BatchVerificationManager::with_key_provider(Arc::new(
        LocalKeyProvider::generate(),
    ));
    let model = ModelHash::new("m1");
    let analyzed: Vec<_> = batches
        .into_iter()
        .map(|b| {
            let result = analysis(b.messages.len() as u64);
            (b, result)
        })
        .collect();

    let proofs = manager.create_batch_proofs(&analyzed, &model).expect("proofs");
    assert!(proofs.len() >= 6);
    assert_eq!(proofs.iter().map(|p| p.message_count).sum::<usize>(), 6_000);

    let bundle = manager
        .aggregate_batch_proofs(proofs, &analysis(6_000), &model)
        .expect("aggregate");
    assert_eq!(bundle.merkle_tree.leaf_count(), bundle.batch_proofs.len());

    let verdict = manager.verify_batch_bundle(&bundle);
    assert!(verdict.is_valid, "{:?}", verdict.failures);
    assert_eq!(verdict.total_batches, bundle.batch_proofs.len());
}

#[test]
fn batch_bundle_survives_wire_round_trip() {
    let manager = BatchVerificationManager::with_key_provider(Arc::new(
        LocalKeyProvider::generate(),
    ));
    let model = ModelHash::new("sha256:model-weights");
    let analyzed: Vec<_> = ChunkingBatchManager
        .create_batches(&messages(250), &BatchConfig { target_batch_size: 100 })
        .into_iter()
        .map(|b| {
            let result = analysis(b.messages.len() as u64);
            (b, result)
        })
        .collect();
    let proofs = manager.create_batch_proofs(&analyzed, &model).unwrap();
    let bundle = manager.aggregate_batch_proofs(proofs, &analysis(250), &model).unwrap();

    let wire = serde_json::to_string(&bundle).unwrap();
    let received: BatchVerificationBundle = serde_json::from_str(&wire).unwrap();
    assert_eq!(received, bundle);
    assert!(received.verify().is_valid);
    assert_eq!(Attestation::model_hash(&received), "sha256:model-weights");
}

#[test]
fn single_bundle_survives_wire_round_trip() {
    let engine = CryptographicEngine::new(Arc::new(LocalKeyProvider::generate()));
    let bundle = engine
        .create_verification_bundle(&analysis(3), &messages(3), &ModelHash::new("m1"))
        .unwrap();
    let received: VerificationBundle =
        serde_json::from_str(&serde_json::to_string(&bundle).unwrap()).unwrap();
    received.verify_signature().expect("signature verifies after transport");
}

#[test]
fn rotation_between_runs_keeps_each_bundle_verifiable() {
    let handle = Arc::new(RotatingKeyHandle::new(Ed25519KeyPair::generate()));
    let engine = CryptographicEngine::new(handle.clone());

    let before = engine
        .create_verification_bundle(&analysis(2), &messages(2), &ModelHash::new("m1"))
        .unwrap();
    handle.rotate(Ed25519KeyPair::generate());
    let after = engine
        .create_verification_bundle(&analysis(2), &messages(2), &ModelHash::new("m1"))
        .unwrap();

    assert_ne!(before.public_key, after.public_key);
    assert!(before.verify());
    assert!(after.verify());
}
