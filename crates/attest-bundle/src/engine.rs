//! # Cryptographic Engine
//!
//! Produces one [`VerificationBundle`] for a single, non-batched analysis.
//!
//! ```text
//! inputHash  = privacy_preserving_message_hash(messages)
//! resultHash = SHA256(JCS(result))
//! signature  = Ed25519(JCS(["attest.bundle.v1", resultHash, inputHash, modelHash]))
//! ```
//!
//! The result hash never normalizes or rejects its input. An analysis with
//! out-of-range or non-finite scores hashes like any other, and validity is
//! reported separately by [`VerificationBundle::is_valid`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use attest_core::{sha256_hex, AnalysisResult, AttestError, CanonicalBytes, Message, ModelHash};
use attest_crypto::ed25519::verify_hex;
use attest_crypto::{privacy_preserving_message_hash, KeyProvider};

use crate::attestation::{Attestation, AttestationKind};

pub(crate) const BUNDLE_TAG: &str = "attest.bundle.v1";

/// Signed attestation of one analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationBundle {
    pub result: AnalysisResult,
    pub result_hash: String,
    pub input_hash: String,
    /// Ed25519 signature, 128 hex chars.
    pub signature: String,
    /// Ed25519 public key, 64 hex chars.
    pub public_key: String,
    pub model_hash: String,
}

impl VerificationBundle {
    /// The wrapped result is internally valid and no string field is empty.
    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
            && [
                &self.result_hash,
                &self.input_hash,
                &self.signature,
                &self.public_key,
                &self.model_hash,
            ]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// Canonical bytes the signature covers.
    pub fn signing_input(&self) -> Result<CanonicalBytes, AttestError> {
        bundle_signing_input(&self.result_hash, &self.input_hash, &self.model_hash)
    }

    /// Recompute `resultHash` from the wrapped result and check the signature.
    pub fn verify_signature(&self) -> Result<(), AttestError> {
        let expected = create_result_hash(&self.result)?;
        if expected != self.result_hash {
            return Err(AttestError::InvalidDataFormat(format!(
                "resultHash mismatch: bundle carries {}, result hashes to {}",
                prefix(&self.result_hash),
                prefix(&expected)
            )));
        }
        verify_hex(&self.signing_input()?, &self.signature, &self.public_key)?;
        Ok(())
    }
}

impl Attestation for VerificationBundle {
    fn kind(&self) -> AttestationKind {
        AttestationKind::Single
    }

    fn is_valid(&self) -> bool {
        VerificationBundle::is_valid(self)
    }

    fn verify(&self) -> bool {
        self.is_valid() && self.verify_signature().is_ok()
    }

    fn model_hash(&self) -> &str {
        &self.model_hash
    }
}

pub(crate) fn bundle_signing_input(
    result_hash: &str,
    input_hash: &str,
    model_hash: &str,
) -> Result<CanonicalBytes, AttestError> {
    Ok(CanonicalBytes::new(&(BUNDLE_TAG, result_hash, input_hash, model_hash))?)
}

/// Deterministic digest of an analysis result.
///
/// Sensitive to every field, including invalid values.
pub fn create_result_hash(result: &AnalysisResult) -> Result<String, AttestError> {
    Ok(sha256_hex(&CanonicalBytes::new(result)?))
}

pub(crate) fn prefix(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// Hashes and signs single analysis results.
///
/// Cheap to clone; clones share the key handle.
#[derive(Clone)]
pub struct CryptographicEngine {
    keys: Arc<dyn KeyProvider>,
}

impl std::fmt::Debug for CryptographicEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptographicEngine")
            .field("provider", &self.keys.provider_name())
            .finish()
    }
}

impl CryptographicEngine {
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self { keys }
    }

    pub fn key_provider(&self) -> &Arc<dyn KeyProvider> {
        &self.keys
    }

    /// See [`create_result_hash`].
    pub fn create_result_hash(&self, result: &AnalysisResult) -> Result<String, AttestError> {
        create_result_hash(result)
    }

    /// Bundle `result` over `messages`. An empty message list is legal.
    pub fn create_verification_bundle(
        &self,
        result: &AnalysisResult,
        messages: &[Message],
        model_hash: &ModelHash,
    ) -> Result<VerificationBundle, AttestError> {
        let input_hash = privacy_preserving_message_hash(messages);
        self.create_verification_bundle_with_input_hash(result, input_hash, model_hash)
    }

    /// Bundle `result` over an input hash computed elsewhere.
    pub fn create_verification_bundle_with_input_hash(
        &self,
        result: &AnalysisResult,
        input_hash: String,
        model_hash: &ModelHash,
    ) -> Result<VerificationBundle, AttestError> {
        let result_hash = create_result_hash(result)?;
        let payload = bundle_signing_input(&result_hash, &input_hash, model_hash.as_str())?;
        let (signature, public_key) = self.sign(&payload)?;

        tracing::info!(
            result_hash = prefix(&result_hash),
            input_hash = prefix(&input_hash),
            model_hash = %model_hash,
            provider = self.keys.provider_name(),
            "verification bundle created"
        );
        metrics::counter!("attest_bundles_created_total", "kind" => "single").increment(1);

        Ok(VerificationBundle {
            result: result.clone(),
            result_hash,
            input_hash,
            signature,
            public_key,
            model_hash: model_hash.as_str().to_string(),
        })
    }

    /// Sign canonical bytes, returning `(signature_hex, public_key_hex)`.
    ///
    /// Any failure of the key handle surfaces as `SigningFailure`.
    pub(crate) fn sign(&self, payload: &CanonicalBytes) -> Result<(String, String), AttestError> {
        let (signature, public_key) = self.keys.sign_with_public_key(payload).map_err(|e| {
            tracing::warn!(provider = self.keys.provider_name(), error = %e, "signing failed");
            AttestError::SigningFailure(e.to_string())
        })?;
        Ok((signature.to_hex(), public_key.to_hex()))
    }
}
