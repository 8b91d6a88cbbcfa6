//! # Hash-Commitment Backend
//!
//! A transparent development backend for the personality circuit. It hides
//! the trait values behind a salted commitment and binds the constraint
//! outcome to the circuit and public inputs, but it is not succinct and the
//! prover is trusted to evaluate the constraints honestly. A succinct backend
//! plugs in behind the same [`ProofSystem`] trait.
//!
//! ## Proof document
//!
//! ```text
//! witnessCommitment = SHA256(salt || JCS(traits))            // fresh 32-byte salt
//! binding           = SHA256("attest.zk.v1" || circuitHash || JCS(publicInputs)
//!                            || witnessCommitment || constraintBits)
//! proofData         = JCS({ version, witnessCommitment, constraints, binding })
//! ```
//!
//! Verification re-parses the document, requires it to be byte-identical to
//! its canonical form, recomputes the binding, and accepts only when every
//! constraint bit is set.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use attest_core::{CanonicalBytes, CanonicalizationError, Sha256Accumulator};

use crate::circuit::{
    ConstraintResults, PersonalityCircuit, PublicInputs, Statement, CIRCUIT_VERSION,
};
use crate::traits::{ProofContext, ProofError, ProofSystem, VerifyError};

const BINDING_TAG: &[u8] = b"attest.zk.v1";

/// Serialized body of a hash-commitment proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProofDocument {
    pub version: u32,
    pub witness_commitment: String,
    pub constraints: ConstraintResults,
    pub binding: String,
}

/// Canonical JSON bytes of a [`ProofDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentProof {
    pub data: Vec<u8>,
}

/// Transparent salted-commitment proof system.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCommitmentBackend;

impl HashCommitmentBackend {
    pub fn new() -> Self {
        Self
    }
}

impl From<Vec<u8>> for CommitmentProof {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<CommitmentProof> for Vec<u8> {
    fn from(proof: CommitmentProof) -> Self {
        proof.data
    }
}

fn binding_hash(
    circuit_hash: &str,
    public_inputs: &PublicInputs,
    witness_commitment: &str,
    constraints: &ConstraintResults,
) -> Result<String, CanonicalizationError> {
    let inputs = CanonicalBytes::new(public_inputs)?;
    let mut acc = Sha256Accumulator::new();
    acc.update(BINDING_TAG);
    acc.update_prefixed(circuit_hash.as_bytes());
    acc.update_prefixed(inputs.as_bytes());
    acc.update_prefixed(witness_commitment.as_bytes());
    acc.update(&[constraints.bits()]);
    Ok(acc.finalize_hex())
}

impl ProofSystem for HashCommitmentBackend {
    type Circuit = PersonalityCircuit;
    type Proof = CommitmentProof;
    type Statement = Statement;

    fn name(&self) -> &'static str {
        "hash-commitment"
    }

    fn prove(
        &self,
        circuit: &PersonalityCircuit,
        ctx: &ProofContext,
    ) -> Result<CommitmentProof, ProofError> {
        ctx.checkpoint("constraints")?;
        let constraints = circuit.evaluate();
        if !constraints.all_satisfied() {
            tracing::debug!(
                unsatisfied = ?constraints.unsatisfied(),
                "proving with unsatisfied constraints"
            );
        }

        let mut salt = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut salt[..]);
        let trait_bytes = circuit.witness.trait_bytes()?;
        let mut acc = Sha256Accumulator::new();
        acc.update(&salt[..]);
        acc.update(&trait_bytes);
        let witness_commitment = acc.finalize_hex();
        drop(trait_bytes);
        drop(salt);

        ctx.checkpoint("seal")?;
        let binding = binding_hash(
            &circuit.circuit_hash,
            &circuit.public_inputs,
            &witness_commitment,
            &constraints,
        )
        .map_err(|e| ProofError::ProverError(format!("public inputs: {e}")))?;

        let document = ProofDocument {
            version: CIRCUIT_VERSION,
            witness_commitment,
            constraints,
            binding,
        };
        let data = CanonicalBytes::new(&document)
            .map_err(|e| ProofError::ProverError(format!("proof document: {e}")))?
            .into_bytes();
        Ok(CommitmentProof { data })
    }

    fn verify(&self, proof: &CommitmentProof, statement: &Statement) -> Result<bool, VerifyError> {
        let document: ProofDocument = serde_json::from_slice(&proof.data)
            .map_err(|e| VerifyError::MalformedProof(format!("proof document: {e}")))?;

        let canonical = CanonicalBytes::new(&document)
            .map_err(|e| VerifyError::MalformedProof(format!("proof document: {e}")))?;
        if canonical.as_bytes() != proof.data.as_slice() {
            return Err(VerifyError::MalformedProof(
                "proof document is not in canonical form".to_string(),
            ));
        }
        if document.version != CIRCUIT_VERSION {
            return Err(VerifyError::CircuitMismatch(format!(
                "proof version {} but circuit version {CIRCUIT_VERSION}",
                document.version
            )));
        }

        let expected = binding_hash(
            &statement.circuit_hash,
            &statement.public_inputs,
            &document.witness_commitment,
            &document.constraints,
        )
        .map_err(|e| VerifyError::MalformedProof(format!("public inputs: {e}")))?;

        Ok(expected == document.binding && document.constraints.all_satisfied())
    }
}
