//! # attest-zkp — Zero-Knowledge Personality Proofs
//!
//! Proves that a set of personality traits was derived from a committed
//! message set and a committed model, and that the traits satisfy public
//! bounds, without revealing the traits or the messages.
//!
//! - [`ProofSystem`] is the backend seam. [`HashCommitmentBackend`] is the
//!   transparent default; a succinct backend implements the same trait.
//! - [`PersonalityProofGenerator`] builds the circuit, commits to message
//!   content, and wraps backend output as a [`ZkProof`].
//! - Generation takes a [`ProofContext`] and stops at fixed checkpoints when
//!   cancelled or past its deadline. No partial proof is ever returned.
//!
//! ## Crate Policy
//!
//! - Raw trait values and message content never appear in a proof or in its
//!   public inputs.
//! - Failing a circuit constraint is not an error. The proof verifies as
//!   invalid.

pub mod circuit;
pub mod commitment;
pub mod generator;
pub mod traits;

pub use circuit::{
    circuit_hash, Bound, CircuitParams, ConstraintResults, MessageBounds, PersonalityCircuit,
    PublicInputs, Statement, TraitRange, Witness, CIRCUIT_NAME, CIRCUIT_VERSION, CONSTRAINTS,
};
pub use commitment::{CommitmentProof, HashCommitmentBackend, ProofDocument};
pub use generator::{PersonalityProofGenerator, ZkProof, ZkVerification, COMMIT_CHECKPOINT_INTERVAL};
pub use traits::{ProofContext, ProofError, ProofSystem, VerifyError};
