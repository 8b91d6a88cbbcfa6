//! # Verify Subcommand
//!
//! Offline verification of a single or batched verification bundle. The
//! bundle shape is detected from its fields: batched bundles carry
//! `batchProofs`.
//!
//! Exit code 0 when the bundle verifies, 1 otherwise.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use attest_bundle::{BatchVerificationBundle, BatchVerificationResult, VerificationBundle};

/// Arguments for `attest verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Bundle JSON produced by `attest bundle` or `attest batch`.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Require the bundle to be signed by this public key (hex).
    #[arg(long)]
    pub pubkey: Option<String>,
}

pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let value: serde_json::Value = crate::read_json(&args.file)?;
    let report = verify_value(value, args.pubkey.as_deref())
        .with_context(|| format!("failed to decode bundle: {}", args.file.display()))?;

    if report.is_valid {
        println!("OK: {} bundle verified ({} batch(es))", report.kind, report.total_batches);
        Ok(0)
    } else {
        println!("FAIL: {} bundle did not verify", report.kind);
        for failure in &report.failures {
            println!("  - {failure}");
        }
        Ok(1)
    }
}

/// What `attest verify` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub kind: &'static str,
    pub is_valid: bool,
    pub total_batches: usize,
    pub failures: Vec<String>,
}

/// Decode `value` as either bundle shape and verify it.
///
/// An outer `bundle` field (the envelope written by `attest bundle`) is
/// unwrapped first.
pub fn verify_value(value: serde_json::Value, pubkey: Option<&str>) -> Result<VerifyReport> {
    let value = match value {
        serde_json::Value::Object(mut map) if map.contains_key("bundle") => map
            .remove("bundle")
            .unwrap_or(serde_json::Value::Null),
        other => other,
    };

    let (kind, result, signer) = if value.get("batchProofs").is_some() {
        let bundle: BatchVerificationBundle = serde_json::from_value(value)?;
        let signer = bundle.main_verification_bundle.public_key.clone();
        ("batched", bundle.verify(), signer)
    } else {
        let bundle: VerificationBundle = serde_json::from_value(value)?;
        let failures = match bundle.verify_signature() {
            Ok(()) if bundle.is_valid() => Vec::new(),
            Ok(()) => vec!["bundle is structurally invalid".to_string()],
            Err(e) => vec![e.to_string()],
        };
        let result = BatchVerificationResult {
            is_valid: failures.is_empty(),
            total_batches: 1,
            failures,
        };
        ("single", result, bundle.public_key)
    };

    let mut report = VerifyReport {
        kind,
        is_valid: result.is_valid,
        total_batches: result.total_batches,
        failures: result.failures,
    };
    if let Some(expected) = pubkey {
        if !expected.trim().eq_ignore_ascii_case(&signer) {
            report.is_valid = false;
            report.failures.push(format!("signed by {signer}, expected {}", expected.trim()));
        }
    }
    tracing::debug!(kind, valid = report.is_valid, "bundle checked");
    Ok(report)
}

/// Arguments for `attest verify-proof`.
#[derive(Args, Debug)]
pub struct VerifyProofArgs {
    /// Proof JSON produced by `attest prove`.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

pub fn run_verify_proof(args: &VerifyProofArgs, config: &crate::config::AttestConfig) -> Result<u8> {
    let verification = verify_proof_file(&args.file, config)?;
    crate::write_output(&verification, None)?;
    Ok(if verification.is_valid { 0 } else { 1 })
}

fn verify_proof_file(
    path: &Path,
    config: &crate::config::AttestConfig,
) -> Result<attest_zkp::ZkVerification> {
    let value: serde_json::Value = crate::read_json(path)?;
    // `attest bundle --zk` nests the proof under `zk.proof`.
    let value = match value.pointer("/zk/proof") {
        Some(inner) => inner.clone(),
        None => value,
    };
    let proof: attest_zkp::ZkProof =
        serde_json::from_value(value).with_context(|| format!("not a proof: {}", path.display()))?;
    Ok(config.proof_generator().verify_proof(&proof))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use attest_bundle::CryptographicEngine;
    use attest_core::{AnalysisResult, ModelHash};
    use attest_crypto::LocalKeyProvider;

    fn result() -> AnalysisResult {
        serde_json::from_value(serde_json::json!({
            "personalityTraits": {
                "openness": 0.5, "conscientiousness": 0.5, "extraversion": 0.5,
                "agreeableness": 0.5, "neuroticism": 0.5, "confidence": 0.8
            },
            "trustworthinessScore": {"score": 0.7, "factors": {}, "explanation": "steady"},
            "messageCount": 0,
            "processingTimeMs": 1
        }))
        .unwrap()
    }

    fn signed_bundle() -> VerificationBundle {
        CryptographicEngine::new(Arc::new(LocalKeyProvider::generate()))
            .create_verification_bundle(&result(), &[], &ModelHash::new("m1"))
            .unwrap()
    }

    #[test]
    fn single_bundle_verifies() {
        let bundle = signed_bundle();
        let report = verify_value(serde_json::to_value(&bundle).unwrap(), None).unwrap();
        assert_eq!(report.kind, "single");
        assert!(report.is_valid, "{:?}", report.failures);
    }

    #[test]
    fn envelope_is_unwrapped() {
        let bundle = signed_bundle();
        let envelope = serde_json::json!({ "bundle": bundle, "upload": {"decision": "allowed"} });
        assert!(verify_value(envelope, None).unwrap().is_valid);
    }

    #[test]
    fn tampered_result_fails() {
        let mut bundle = signed_bundle();
        bundle.result.processing_time_ms += 1;
        let report = verify_value(serde_json::to_value(&bundle).unwrap(), None).unwrap();
        assert!(!report.is_valid);
        assert!(!report.failures.is_empty());
    }

    #[test]
    fn pinned_signer_mismatch_fails() {
        let bundle = signed_bundle();
        let other = LocalKeyProvider::generate();
        let other_hex = attest_crypto::KeyProvider::public_key(&other).unwrap().to_hex();
        let value = serde_json::to_value(&bundle).unwrap();

        assert!(!verify_value(value.clone(), Some(&other_hex)).unwrap().is_valid);
        assert!(verify_value(value, Some(&bundle.public_key)).unwrap().is_valid);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(verify_value(serde_json::json!({"hello": 1}), None).is_err());
    }
}
