//! # Batch Verification Manager
//!
//! Scales the single-bundle guarantee to arbitrarily large inputs. Each
//! batch is proved independently, then the proofs are bound under a Merkle
//! root and one aggregated signature.
//!
//! ## Construction
//!
//! ```text
//! batchHash       = SHA256(JCS(batch.messages))
//! batch signature = Ed25519(JCS(["attest.batch.v1", batchHash, resultHash, modelHash, batchIndex]))
//! leaf[i]         = { id: batchId, hash: batchHash, data: resultHash }
//! inputHash       = SHA256(JCS(["attest.batches.v1", [batchHash...]]))   // main bundle
//! descriptor[i]   = [batchId, batchIndex, messageCount, qualityScore]
//! aggregated sig  = Ed25519(JCS(["attest.aggregate.v1", merkleRoot, [batchSignature...],
//!                                [descriptor...], finalResultHash]))
//! ```
//!
//! Every batch proof and the aggregate must be signed by the same key.
//!
//! ## Concurrency
//!
//! Batch proofs have no data dependency on one another and are generated on
//! the rayon pool. Aggregation is single-threaded and observes proofs in the
//! caller's order, since order is part of the Merkle commitment.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use attest_core::{
    sha256_hex, AnalysisResult, AttestError, BatchId, CanonicalBytes, MessageBatch, ModelHash,
    Score,
};
use attest_crypto::ed25519::verify_hex;
use attest_crypto::{KeyProvider, MerkleLeaf, MerkleTree};

use crate::attestation::{Attestation, AttestationKind};
use crate::engine::{prefix, CryptographicEngine, VerificationBundle};

const BATCH_TAG: &str = "attest.batch.v1";
const BATCH_SET_TAG: &str = "attest.batches.v1";
const AGGREGATE_TAG: &str = "attest.aggregate.v1";

/// Message count at which the volume term of the quality score saturates.
const VOLUME_SATURATION: f64 = 100.0;

/// Signed evidence for one analyzed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProof {
    /// Identifier of the proved batch.
    pub batch_id: BatchId,
    /// Position in the run. Signed.
    pub batch_index: usize,
    /// Hex Ed25519 signature over the per-batch payload.
    pub signature: String,
    /// `SHA256(JCS(messages))` of the batch.
    pub batch_hash: String,
    /// Hash of the batch's analysis result.
    pub result_hash: String,
    /// Messages in the batch. Covered by the aggregated signature.
    pub message_count: usize,
    /// See [`quality_score`]. Covered by the aggregated signature.
    pub quality_score: Score,
}

impl BatchProof {
    fn leaf(&self) -> MerkleLeaf {
        MerkleLeaf::new(
            self.batch_id.as_uuid().to_string(),
            self.batch_hash.clone(),
            self.result_hash.clone(),
        )
    }

    /// Check this proof's signature against `public_key_hex`.
    pub fn verify_signature(&self, model_hash: &str, public_key_hex: &str) -> Result<(), AttestError> {
        let payload = batch_signing_input(
            &self.batch_hash,
            &self.result_hash,
            model_hash,
            self.batch_index,
        )?;
        verify_hex(&payload, &self.signature, public_key_hex)?;
        Ok(())
    }
}

/// Aggregate of every batch proof for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchVerificationBundle {
    /// Proofs in batch order.
    pub batch_proofs: Vec<BatchProof>,
    /// Hex signature binding the root, the proofs and the final result.
    pub aggregated_signature: String,
    /// Bundle over the combined result.
    pub main_verification_bundle: VerificationBundle,
    /// Tree over one leaf per proof.
    pub merkle_tree: MerkleTree,
}

/// Outcome of [`BatchVerificationManager::verify_batch_bundle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchVerificationResult {
    /// Every check passed.
    pub is_valid: bool,
    /// Proofs in the bundle.
    pub total_batches: usize,
    /// One entry per failed check; empty when valid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl BatchVerificationBundle {
    /// Structural checks only: non-empty, leaf count matches, main bundle
    /// valid, every quality score bounded, aggregated signature present.
    pub fn is_valid(&self) -> bool {
        !self.batch_proofs.is_empty()
            && self.merkle_tree.leaf_count() == self.batch_proofs.len()
            && self.main_verification_bundle.is_valid()
            && !self.aggregated_signature.trim().is_empty()
            && self.batch_proofs.iter().all(|p| p.quality_score.is_bounded())
    }

    /// Recompute every commitment and check every signature.
    pub fn verify(&self) -> BatchVerificationResult {
        let mut failures = Vec::new();
        let main = &self.main_verification_bundle;

        if self.batch_proofs.is_empty() {
            failures.push("bundle has no batch proofs".to_string());
        }

        let leaves: Vec<MerkleLeaf> = self.batch_proofs.iter().map(BatchProof::leaf).collect();
        match MerkleTree::new(leaves.clone()) {
            Ok(recomputed) if recomputed.root_hash() == self.merkle_tree.root_hash() => {}
            Ok(_) => failures.push("merkle root does not match batch proofs".to_string()),
            Err(e) => failures.push(format!("merkle root could not be recomputed: {e}")),
        }
        if self.merkle_tree.leaves() != leaves.as_slice() {
            failures.push("merkle leaves do not match batch proofs".to_string());
        }
        match self.merkle_tree.verify() {
            Ok(true) => {}
            Ok(false) => failures.push("stored merkle tree is inconsistent".to_string()),
            Err(e) => failures.push(e.to_string()),
        }

        if !main.is_valid() {
            failures.push("main verification bundle is not valid".to_string());
        }
        if let Err(e) = main.verify_signature() {
            failures.push(format!("main verification bundle: {e}"));
        }
        match batch_set_hash(&self.batch_proofs) {
            Ok(expected) if expected == main.input_hash => {}
            Ok(_) => failures.push("main inputHash does not commit to the batch set".to_string()),
            Err(e) => failures.push(e.to_string()),
        }

        let aggregate = aggregate_signing_input(
            self.merkle_tree.root_hash(),
            &self.batch_proofs,
            &main.result_hash,
        )
        .and_then(|payload| {
            verify_hex(&payload, &self.aggregated_signature, &main.public_key)
                .map_err(AttestError::from)
        });
        if let Err(e) = aggregate {
            failures.push(format!("aggregated signature: {e}"));
        }

        for proof in &self.batch_proofs {
            if let Err(e) = proof.verify_signature(&main.model_hash, &main.public_key) {
                failures.push(format!("batch {}: {e}", proof.batch_index));
            }
            if !proof.quality_score.is_bounded() {
                failures.push(format!("batch {}: quality score out of range", proof.batch_index));
            }
        }

        BatchVerificationResult {
            is_valid: failures.is_empty(),
            total_batches: self.batch_proofs.len(),
            failures,
        }
    }
}

impl Attestation for BatchVerificationBundle {
    fn kind(&self) -> AttestationKind {
        AttestationKind::Batched
    }

    fn is_valid(&self) -> bool {
        BatchVerificationBundle::is_valid(self)
    }

    fn verify(&self) -> bool {
        BatchVerificationBundle::verify(self).is_valid
    }

    fn model_hash(&self) -> &str {
        &self.main_verification_bundle.model_hash
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

fn batch_signing_input(
    batch_hash: &str,
    result_hash: &str,
    model_hash: &str,
    batch_index: usize,
) -> Result<CanonicalBytes, AttestError> {
    Ok(CanonicalBytes::new(&(BATCH_TAG, batch_hash, result_hash, model_hash, batch_index))?)
}

fn aggregate_signing_input(
    merkle_root: &str,
    proofs: &[BatchProof],
    final_result_hash: &str,
) -> Result<CanonicalBytes, AttestError> {
    let signatures: Vec<&str> = proofs.iter().map(|p| p.signature.as_str()).collect();
    let descriptors: Vec<(&BatchId, usize, usize, Score)> = proofs
        .iter()
        .map(|p| (&p.batch_id, p.batch_index, p.message_count, p.quality_score))
        .collect();
    Ok(CanonicalBytes::new(&(
        AGGREGATE_TAG,
        merkle_root,
        signatures,
        descriptors,
        final_result_hash,
    ))?)
}

/// Representative input hash for the main bundle of an aggregation.
fn batch_set_hash(proofs: &[BatchProof]) -> Result<String, AttestError> {
    let hashes: Vec<&str> = proofs.iter().map(|p| p.batch_hash.as_str()).collect();
    Ok(sha256_hex(&CanonicalBytes::new(&(BATCH_SET_TAG, hashes))?))
}

/// Per-batch confidence indicator in `[0, 1]`.
///
/// `0.5 * confidence + 0.3 * min(1, messages / 100) + 0.2 * senderDiversity`.
/// Non-finite inputs contribute zero.
pub fn quality_score(confidence: Score, message_count: usize, sender_diversity: Score) -> Score {
    let volume = (message_count as f64 / VOLUME_SATURATION).min(1.0);
    let raw = 0.5 * confidence.clamped() + 0.3 * volume + 0.2 * sender_diversity.clamped();
    Score(raw.clamp(0.0, 1.0))
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Produces batch proofs and aggregates them into batch bundles.
#[derive(Debug, Clone)]
pub struct BatchVerificationManager {
    engine: CryptographicEngine,
}

impl BatchVerificationManager {
    pub fn new(engine: CryptographicEngine) -> Self {
        Self { engine }
    }

    pub fn with_key_provider(keys: std::sync::Arc<dyn KeyProvider>) -> Self {
        Self::new(CryptographicEngine::new(keys))
    }

    pub fn engine(&self) -> &CryptographicEngine {
        &self.engine
    }

    /// Prove one batch.
    pub fn create_batch_proof(
        &self,
        batch: &MessageBatch,
        result: &AnalysisResult,
        model_hash: &ModelHash,
    ) -> Result<BatchProof, AttestError> {
        let batch_hash = sha256_hex(&CanonicalBytes::new(&batch.messages)?);
        let result_hash = self.engine.create_result_hash(result)?;
        let payload =
            batch_signing_input(&batch_hash, &result_hash, model_hash.as_str(), batch.batch_index)?;
        let (signature, _) = self.engine.sign(&payload)?;

        let message_count = batch.messages.len();
        let quality = quality_score(
            result.personality_traits.confidence,
            message_count,
            batch.metadata.sender_diversity,
        );

        tracing::debug!(
            batch_index = batch.batch_index,
            batch_hash = prefix(&batch_hash),
            message_count,
            quality = quality.value(),
            "batch proof created"
        );
        metrics::counter!("attest_batch_proofs_total").increment(1);

        Ok(BatchProof {
            batch_id: batch.id.clone(),
            batch_index: batch.batch_index,
            signature,
            batch_hash,
            result_hash,
            message_count,
            quality_score: quality,
        })
    }

    /// Prove every batch in parallel. Output order matches input order; any
    /// failure aborts the whole set.
    pub fn create_batch_proofs(
        &self,
        batches: &[(MessageBatch, AnalysisResult)],
        model_hash: &ModelHash,
    ) -> Result<Vec<BatchProof>, AttestError> {
        batches
            .par_iter()
            .map(|(batch, result)| self.create_batch_proof(batch, result, model_hash))
            .collect()
    }

    /// Bind `proofs` (in the given order) and `final_result` into one bundle.
    ///
    /// Zero proofs fail with `EmptyInput`. A proof not signed by the current
    /// key (rotation since proving, or an altered proof) fails with
    /// `SigningFailure`.
    pub fn aggregate_batch_proofs(
        &self,
        proofs: Vec<BatchProof>,
        final_result: &AnalysisResult,
        model_hash: &ModelHash,
    ) -> Result<BatchVerificationBundle, AttestError> {
        let leaves = proofs.iter().map(BatchProof::leaf).collect();
        let merkle_tree = MerkleTree::new(leaves)?;

        let input_hash = batch_set_hash(&proofs)?;
        let main = self.engine.create_verification_bundle_with_input_hash(
            final_result,
            input_hash,
            model_hash,
        )?;

        for proof in &proofs {
            if let Err(e) = proof.verify_signature(model_hash.as_str(), &main.public_key) {
                tracing::warn!(
                    batch_index = proof.batch_index,
                    error = %e,
                    "batch proof not signed by the aggregation key"
                );
                return Err(AttestError::SigningFailure(format!(
                    "batch {} was not signed by the aggregation key",
                    proof.batch_index
                )));
            }
        }

        let payload =
            aggregate_signing_input(merkle_tree.root_hash(), &proofs, &main.result_hash)?;
        let (aggregated_signature, public_key) = self.engine.sign(&payload)?;
        if public_key != main.public_key {
            return Err(AttestError::SigningFailure(
                "signing key rotated during aggregation".to_string(),
            ));
        }

        tracing::info!(
            batch_count = proofs.len(),
            merkle_root = prefix(merkle_tree.root_hash()),
            result_hash = prefix(&main.result_hash),
            "batch proofs aggregated"
        );
        metrics::counter!("attest_bundles_created_total", "kind" => "batched").increment(1);

        Ok(BatchVerificationBundle {
            batch_proofs: proofs,
            aggregated_signature,
            main_verification_bundle: main,
            merkle_tree,
        })
    }

    /// Full verification of a batch bundle. Never fails; problems are
    /// reported through `is_valid` and `failures`.
    pub fn verify_batch_bundle(&self, bundle: &BatchVerificationBundle) -> BatchVerificationResult {
        let result = bundle.verify();
        if result.is_valid {
            tracing::debug!(total_batches = result.total_batches, "batch bundle verified");
        } else {
            tracing::warn!(
                total_batches = result.total_batches,
                failures = ?result.failures,
                "batch bundle rejected"
            );
            metrics::counter!("attest_bundle_rejections_total", "kind" => "batched").increment(1);
        }
        result
    }
}
