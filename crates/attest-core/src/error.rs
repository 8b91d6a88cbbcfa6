//! # Error Types — Structured Error Hierarchy
//!
//! Every public operation in the workspace returns a typed result or fails
//! with one of the kinds defined here. Lower layers use narrow enums
//! (`CanonicalizationError`, `CryptoError`); the boundary type
//! [`AttestError`] carries exactly the attestation failure taxonomy.
//!
//! ## Retry policy
//!
//! Transient failures (`SigningFailure`, `DeviceCompromised`) may be retried
//! by the caller. Structural failures (empty input, malformed bundle, proof
//! errors) are not retryable without changing the input.

use thiserror::Error;

/// Top-level error type for attestation operations.
#[derive(Error, Debug)]
pub enum AttestError {
    /// An operation that requires at least one element received none.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// The signing key is invalid, revoked, or otherwise unusable.
    #[error("signing failure: {0}")]
    SigningFailure(String),

    /// A bundle, proof, or key failed structural decoding.
    #[error("invalid data format: {0}")]
    InvalidDataFormat(String),

    /// Zero-knowledge proof generation failed or was abandoned.
    #[error("proof generation failure: {0}")]
    ProofGenerationFailure(String),

    /// Zero-knowledge proof verification could not be carried out.
    #[error("proof verification failure: {0}")]
    ProofVerificationFailure(String),

    /// The device security gate rejected the operation.
    #[error("device compromised: {0}")]
    DeviceCompromised(String),
}

impl AttestError {
    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SigningFailure(_) | Self::DeviceCompromised(_))
    }
}

impl From<CanonicalizationError> for AttestError {
    fn from(err: CanonicalizationError) -> Self {
        Self::InvalidDataFormat(err.to_string())
    }
}

impl From<CryptoError> for AttestError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::EmptyTree => Self::EmptyInput(err.to_string()),
            CryptoError::SigningFailure(msg) => Self::SigningFailure(msg),
            CryptoError::VerificationFailed(_)
            | CryptoError::KeyError(_)
            | CryptoError::DigestError(_)
            | CryptoError::CorruptTree(_) => Self::InvalidDataFormat(err.to_string()),
        }
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// Digest parsing or computation failed.
    #[error("digest error: {0}")]
    DigestError(String),

    /// The key handle could not produce a signature.
    #[error("signing failure: {0}")]
    SigningFailure(String),

    /// A Merkle tree was requested over zero leaves.
    #[error("cannot build a Merkle tree from zero leaves")]
    EmptyTree,

    /// Stored Merkle data is internally inconsistent.
    #[error("corrupt Merkle tree: {0}")]
    CorruptTree(String),
}
