//! # Proof System Trait
//!
//! Abstract interface for zero-knowledge proof backends. The personality
//! proof generator is written against this trait only, so a succinct
//! backend can replace the hash-commitment backend without touching callers.
//!
//! Generation is the one long-running operation in the workspace. It takes a
//! [`ProofContext`] carrying a cancellation token and an optional deadline,
//! and backends poll [`ProofContext::checkpoint`] at fixed stages. A
//! cancelled or expired generation returns an error and no proof.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use attest_core::AttestError;

/// Error during proof generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// The circuit definition is malformed.
    #[error("circuit error: {0}")]
    CircuitError(String),
    /// Witness data could not be committed.
    #[error("witness error: {0}")]
    WitnessError(String),
    /// The caller abandoned the generation.
    #[error("proof generation cancelled at {0}")]
    Cancelled(&'static str),
    /// The caller's deadline passed before generation finished.
    #[error("proof generation deadline exceeded at {0}")]
    DeadlineExceeded(&'static str),
    /// Internal prover error.
    #[error("prover error: {0}")]
    ProverError(String),
}

/// Error during proof verification.
///
/// A proof whose constraints are unsatisfied is not an error; it verifies as
/// `false`. These variants cover proofs that cannot be checked at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The proof bytes do not decode.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// The proof was produced for a different circuit.
    #[error("circuit mismatch: {0}")]
    CircuitMismatch(String),
}

impl From<ProofError> for AttestError {
    fn from(err: ProofError) -> Self {
        AttestError::ProofGenerationFailure(err.to_string())
    }
}

impl From<VerifyError> for AttestError {
    fn from(err: VerifyError) -> Self {
        AttestError::ProofVerificationFailure(err.to_string())
    }
}

/// Cancellation and deadline for one proof generation.
#[derive(Debug, Clone, Default)]
pub struct ProofContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ProofContext {
    /// No deadline, fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a caller-owned token (e.g. the analysis run's).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail if the caller cancelled or the deadline passed.
    ///
    /// Cancellation wins over an expired deadline.
    pub fn checkpoint(&self, stage: &'static str) -> Result<(), ProofError> {
        if self.cancel.is_cancelled() {
            return Err(ProofError::Cancelled(stage));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ProofError::DeadlineExceeded(stage));
        }
        Ok(())
    }
}

/// A zero-knowledge proof backend.
pub trait ProofSystem: Send + Sync {
    /// Public inputs plus private witness for one proof.
    type Circuit;
    /// Opaque proof produced by this backend.
    type Proof;
    /// What the verifier sees: circuit identity and public inputs.
    type Statement;

    /// Backend identifier, recorded in logs.
    fn name(&self) -> &'static str;

    /// Generate a proof, polling `ctx` at the backend's checkpoints.
    fn prove(&self, circuit: &Self::Circuit, ctx: &ProofContext) -> Result<Self::Proof, ProofError>;

    /// `Ok(false)` for a well-formed proof whose constraints do not hold.
    fn verify(&self, proof: &Self::Proof, statement: &Self::Statement) -> Result<bool, VerifyError>;
}
