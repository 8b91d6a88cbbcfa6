//! # attest-bundle — Verification Bundles
//!
//! Turns a completed analysis into evidence a remote verifier can check
//! without seeing the source messages.
//!
//! - [`CryptographicEngine`] signs a single [`VerificationBundle`] for small
//!   inputs.
//! - [`BatchVerificationManager`] proves each [`MessageBatch`] independently
//!   (in parallel) and aggregates the proofs under a Merkle root into a
//!   [`BatchVerificationBundle`].
//! - [`ChunkingBatchManager`] is the reference partitioner behind the
//!   [`BatchManager`] seam.
//!
//! ## Signed payloads
//!
//! Every signature covers a canonical JSON array with a version tag in
//! position zero:
//!
//! | Object | Payload |
//! |---|---|
//! | `VerificationBundle` | `["attest.bundle.v1", resultHash, inputHash, modelHash]` |
//! | `BatchProof` | `["attest.batch.v1", batchHash, resultHash, modelHash, batchIndex]` |
//! | aggregated signature | `["attest.aggregate.v1", merkleRoot, [batchSignature...], [[batchId, batchIndex, messageCount, qualityScore]...], finalResultHash]` |
//!
//! [`MessageBatch`]: attest_core::MessageBatch

pub mod attestation;
pub mod batch;
pub mod batcher;
pub mod engine;

pub use attestation::{Attestation, AttestationKind};
pub use batch::{
    quality_score, BatchProof, BatchVerificationBundle, BatchVerificationManager,
    BatchVerificationResult,
};
pub use batcher::{batch_metadata, BatchConfig, BatchManager, ChunkingBatchManager};
pub use engine::{create_result_hash, CryptographicEngine, VerificationBundle};
