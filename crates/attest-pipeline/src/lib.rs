//! # attest-pipeline — End-to-End Attestation
//!
//! Composes the library crates into the run a host application performs
//! after an analysis completes: pre-flight security check, bundle creation
//! (single-shot or batched), posture gate, and the optional
//! zero-knowledge proof.
//!
//! The pipeline never uploads anything. It returns an
//! [`AttestationOutcome`] whose [`UploadDecision`] tells the host's
//! transport layer what it may do with the bundle.

pub mod pipeline;

pub use pipeline::{
    AttestationOutcome, AttestationPipeline, AttestationRequest, AttestedBundle, BatchAnalyzer,
    PipelineConfig, RunContext, UploadDecision, ZkOutcome,
};
