#![deny(missing_docs)]

//! # attest-core — Foundational Types for Analysis Attestation
//!
//! This crate is the leaf of the attestation workspace. It defines the
//! data model that every other crate hashes, signs, batches, and proves,
//! together with the primitives that make those hashes reproducible on a
//! remote verifier.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** All structured digests flow through
//!    `CanonicalBytes::new()` (RFC 8785 / JCS). No raw `serde_json::to_vec()`
//!    for anything that is hashed or signed.
//!
//! 2. **Strongly typed payloads.** `AnalysisResult`, `MessageBatch`, and the
//!    identifiers are concrete structs with one serialization boundary. Shapes
//!    are never inferred at runtime.
//!
//! 3. **Bounded scalars carry their own validity.** `Score` wraps an `f64`
//!    and reports whether it lies in `[0, 1]`, but hashing never normalizes
//!    or rejects it.
//!
//! 4. **UTC-only timestamps.** `Timestamp` serializes as `YYYY-MM-DDTHH:MM:SSZ`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `attest-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod model;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{
    sha256_digest, sha256_hex, sha256_hex_bytes, ContentDigest, DigestAlgorithm, Sha256Accumulator,
};
pub use error::{AttestError, CanonicalizationError, CryptoError};
pub use identity::{BatchId, MessageId, ModelHash};
pub use model::{
    AnalysisResult, BatchMetadata, Message, MessageBatch, MessageDirection, PersonalityTraits,
    Score, TimeSpan, TraitKind, TrustworthinessScore,
};
pub use temporal::Timestamp;
