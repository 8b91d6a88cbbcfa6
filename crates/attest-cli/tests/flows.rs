//! End-to-end flows through the CLI handlers, on temp files.

use std::path::Path;

use attest_cli::attest::{run_batch, BatchArgs};
use attest_cli::config::AttestConfig;
use attest_cli::keys::{run_keygen, KeygenArgs};
use attest_cli::verify::{run_verify, verify_value, VerifyArgs};

fn result_json(confidence: f64) -> serde_json::Value {
    serde_json::json!({
        "personalityTraits": {
            "openness": 0.3, "conscientiousness": 0.6, "extraversion": 0.5,
            "agreeableness": 0.8, "neuroticism": 0.1, "confidence": confidence
        },
        "trustworthinessScore": {
            "score": 0.75,
            "factors": {"consistency": 0.8},
            "explanation": "consistent tone"
        },
        "messageCount": 3,
        "processingTimeMs": 42
    })
}

fn message_json(n: u32, sender: &str) -> serde_json::Value {
    serde_json::json!({
        "id": format!("00000000-0000-4000-8000-{n:012}"),
        "content": format!("message number {n}"),
        "timestamp": format!("2026-03-01T10:00:{:02}Z", n % 60),
        "sender": sender,
        "recipient": "me",
        "direction": "incoming"
    })
}

fn keygen(dir: &Path) -> std::path::PathBuf {
    let args = KeygenArgs {
        output: dir.to_path_buf(),
        prefix: "device".into(),
        force: false,
    };
    assert_eq!(run_keygen(&args).unwrap(), 0);
    dir.join("device.key")
}

#[test]
fn config_file_round_trips_through_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attest.yaml");
    std::fs::write(
        &path,
        "batching:\n  target_batch_size: 250\nsecurity:\n  trusted_threshold: 0.95\n",
    )
    .unwrap();

    let config = AttestConfig::load(Some(&path)).unwrap();
    assert_eq!(config.pipeline_config().target_batch_size, 250);
    assert_eq!(config.pipeline_config().single_shot_threshold, 1_000);
    assert_eq!(config.security_thresholds().trusted, 0.95);
    assert_eq!(config.security_thresholds().degraded, 0.6);
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(AttestConfig::load(Some(&dir.path().join("nope.yaml"))).is_err());
}

#[test]
fn no_config_path_gives_defaults() {
    assert_eq!(AttestConfig::load(None).unwrap(), AttestConfig::default());
}

#[test]
fn batch_then_verify() {
    let dir = tempfile::tempdir().unwrap();
    let key = keygen(dir.path());

    let input = dir.path().join("batches.json");
    std::fs::write(
        &input,
        serde_json::to_string(&serde_json::json!({
            "modelHash": "m1",
            "result": result_json(0.8),
            "batches": [
                {"messages": [message_json(1, "ann"), message_json(2, "bob")], "result": result_json(0.7)},
                {"messages": [message_json(3, "ann")], "result": result_json(0.9)},
                {"messages": [message_json(4, "cy")], "result": result_json(0.6)}
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    let bundle_path = dir.path().join("bundle.json");
    let code = run_batch(&BatchArgs {
        input,
        key: Some(key),
        output: Some(bundle_path.clone()),
    })
    .unwrap();
    assert_eq!(code, 0);

    let verify = |pubkey: Option<String>| {
        run_verify(&VerifyArgs {
            file: bundle_path.clone(),
            pubkey,
        })
        .unwrap()
    };
    assert_eq!(verify(None), 0);

    let pub_hex = std::fs::read_to_string(dir.path().join("device.pub")).unwrap();
    assert_eq!(verify(Some(pub_hex)), 0);
    assert_eq!(verify(Some("00".repeat(32))), 1);

    let mut value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&bundle_path).unwrap()).unwrap();
    assert_eq!(value["batchProofs"].as_array().map(Vec::len), Some(3));

    // Reordering proofs breaks the Merkle commitment.
    let proofs = value["batchProofs"].as_array_mut().unwrap();
    proofs.swap(0, 2);
    let report = verify_value(value, None).unwrap();
    assert_eq!(report.kind, "batched");
    assert!(!report.is_valid);
}
