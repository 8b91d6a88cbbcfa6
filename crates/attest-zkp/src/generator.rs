//! # Personality Proof Generator
//!
//! Builds the personality circuit from a message set, the analysis traits and
//! the declared model, runs it through a [`ProofSystem`] backend, and wraps
//! the output as a [`ZkProof`] ready for upload next to the verification
//! bundle.
//!
//! Message content is committed with the privacy-preserving message-set hash
//! and never reaches the proof or its public inputs.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use attest_core::{Message, ModelHash, PersonalityTraits};
use attest_crypto::MessageSetHasher;

use crate::circuit::{
    circuit_hash, CircuitParams, MessageBounds, PersonalityCircuit, PublicInputs, Statement,
    Witness,
};
use crate::commitment::HashCommitmentBackend;
use crate::traits::{ProofContext, ProofError, ProofSystem, VerifyError};

/// Messages hashed between two cancellation checkpoints.
pub const COMMIT_CHECKPOINT_INTERVAL: usize = 256;

/// A finished zero-knowledge proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkProof {
    /// Backend proof bytes, hex on the wire.
    #[serde(with = "hex_bytes")]
    pub proof_data: Vec<u8>,
    /// Statement the proof is about.
    pub public_inputs: PublicInputs,
    /// Hash of the circuit definition the proof was made for.
    pub circuit_hash: String,
    /// Must equal `proof_data.len()`.
    pub size_bytes: usize,
}

impl ZkProof {
    /// Non-empty and the declared size matches the payload.
    pub fn is_well_formed(&self) -> bool {
        self.size_bytes > 0 && self.size_bytes == self.proof_data.len()
    }
}

/// Outcome of [`PersonalityProofGenerator::verify_proof`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkVerification {
    /// Well-formed, bound to this circuit and every constraint holds.
    pub is_valid: bool,
    /// Time spent verifying.
    pub verification_time: Duration,
    /// Why the proof was rejected. `None` when valid.
    pub failure: Option<String>,
}

/// Generates and verifies personality proofs under one set of thresholds.
#[derive(Debug, Clone)]
pub struct PersonalityProofGenerator<P = HashCommitmentBackend> {
    backend: P,
    params: CircuitParams,
    committed_model_hash: Option<ModelHash>,
}

impl PersonalityProofGenerator<HashCommitmentBackend> {
    pub fn new(params: CircuitParams) -> Self {
        Self::with_backend(HashCommitmentBackend::new(), params)
    }
}

impl Default for PersonalityProofGenerator<HashCommitmentBackend> {
    fn default() -> Self {
        Self::new(CircuitParams::default())
    }
}

impl<P> PersonalityProofGenerator<P>
where
    P: ProofSystem<Circuit = PersonalityCircuit, Statement = Statement>,
    P::Proof: Into<Vec<u8>> + From<Vec<u8>>,
{
    pub fn with_backend(backend: P, params: CircuitParams) -> Self {
        Self {
            backend,
            params,
            committed_model_hash: None,
        }
    }

    /// Hash of the model weights actually loaded. Without it the declared
    /// model hash is taken as committed.
    pub fn with_committed_model_hash(mut self, hash: ModelHash) -> Self {
        self.committed_model_hash = Some(hash);
        self
    }

    pub fn params(&self) -> &CircuitParams {
        &self.params
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Prove that `traits` were derived from `messages` with `model_hash`.
    ///
    /// Unsatisfied constraints still produce a proof; it verifies as invalid.
    /// A cancelled or expired `ctx` returns an error and no proof.
    pub fn generate_personality_proof(
        &self,
        messages: &[Message],
        traits: &PersonalityTraits,
        model_hash: &ModelHash,
        ctx: &ProofContext,
    ) -> Result<ZkProof, ProofError> {
        let started = Instant::now();
        let result = self.generate(messages, traits, model_hash, ctx);
        match &result {
            Ok(proof) => {
                let elapsed = started.elapsed();
                metrics::histogram!("attest_zk_proof_duration_seconds")
                    .record(elapsed.as_secs_f64());
                tracing::info!(
                    backend = self.backend.name(),
                    messages = messages.len(),
                    size_bytes = proof.size_bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "personality proof generated"
                );
            }
            Err(ProofError::Cancelled(stage) | ProofError::DeadlineExceeded(stage)) => {
                tracing::info!(stage, "personality proof abandoned");
            }
            Err(e) => tracing::warn!(error = %e, "personality proof generation failed"),
        }
        result
    }

    fn generate(
        &self,
        messages: &[Message],
        traits: &PersonalityTraits,
        model_hash: &ModelHash,
        ctx: &ProofContext,
    ) -> Result<ZkProof, ProofError> {
        ctx.checkpoint("start")?;
        self.params.validate()?;

        let mut hasher = MessageSetHasher::new(messages.len());
        for (i, message) in messages.iter().enumerate() {
            if i > 0 && i % COMMIT_CHECKPOINT_INTERVAL == 0 {
                ctx.checkpoint("commit")?;
            }
            hasher.push(&message.content);
        }
        let message_commitment = hasher
            .finish()
            .map_err(|e| ProofError::WitnessError(e.to_string()))?;

        let circuit_hash = circuit_hash()?;
        let committed = self
            .committed_model_hash
            .as_ref()
            .unwrap_or(model_hash)
            .as_str()
            .to_string();
        let circuit = PersonalityCircuit {
            circuit_hash: circuit_hash.clone(),
            public_inputs: PublicInputs {
                trait_ranges: self.params.trait_ranges(),
                message_commitment,
                model_hash: model_hash.as_str().to_string(),
                min_confidence: self.params.min_confidence,
                message_bounds: MessageBounds {
                    min: self.params.min_messages,
                    max: self.params.max_messages,
                },
            },
            witness: Witness {
                traits: traits.clone(),
                message_count: messages.len() as u64,
                committed_model_hash: committed,
            },
        };

        let proof_data: Vec<u8> = self.backend.prove(&circuit, ctx)?.into();
        if proof_data.is_empty() {
            return Err(ProofError::ProverError("backend produced an empty proof".into()));
        }

        let PersonalityCircuit { public_inputs, .. } = circuit;
        Ok(ZkProof {
            size_bytes: proof_data.len(),
            proof_data,
            public_inputs,
            circuit_hash,
        })
    }

    /// Check `proof` against its own public inputs and the current circuit.
    ///
    /// Never fails: malformed or tampered proofs verify as invalid.
    pub fn verify_proof(&self, proof: &ZkProof) -> ZkVerification {
        let started = Instant::now();
        let outcome = self.check(proof);
        let verification_time = started.elapsed().max(Duration::from_nanos(1));

        let failure = match &outcome {
            Ok(true) => None,
            Ok(false) => Some("constraints unsatisfied or binding mismatch".to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = &failure {
            tracing::warn!(reason = %reason, "personality proof rejected");
        }
        ZkVerification {
            is_valid: failure.is_none(),
            verification_time,
            failure,
        }
    }

    fn check(&self, proof: &ZkProof) -> Result<bool, VerifyError> {
        if !proof.is_well_formed() {
            return Err(VerifyError::MalformedProof(format!(
                "sizeBytes {} does not match {} bytes of proof data",
                proof.size_bytes,
                proof.proof_data.len()
            )));
        }
        let current = circuit_hash().map_err(|e| VerifyError::CircuitMismatch(e.to_string()))?;
        if proof.circuit_hash != current {
            return Err(VerifyError::CircuitMismatch(format!(
                "proof circuit {} is not {}",
                prefix(&proof.circuit_hash),
                prefix(&current)
            )));
        }
        let statement = Statement {
            circuit_hash: proof.circuit_hash.clone(),
            public_inputs: proof.public_inputs.clone(),
        };
        self.backend
            .verify(&P::Proof::from(proof.proof_data.clone()), &statement)
    }
}

fn prefix(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&attest_core::digest::bytes_to_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        attest_core::digest::hex_to_bytes(&s).map_err(serde::de::Error::custom)
    }
}
