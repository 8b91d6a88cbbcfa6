#![deny(missing_docs)]

//! # attest-crypto — Cryptographic Primitives
//!
//! Provides the building blocks that the bundle, batch, and proof layers
//! compose:
//!
//! - **SHA-256** content hashing and the privacy-preserving message-set hash.
//! - **Ed25519** signing and verification over `CanonicalBytes`.
//! - **Key custody** via the [`KeyProvider`] trait, with local, environment,
//!   and rotating/revocable handles.
//! - **Merkle tree** over ordered leaves, with inclusion proofs.
//!
//! ## Crate Policy
//!
//! - Depends only on `attest-core` internally.
//! - No mocking of cryptographic operations in tests. All tests use real
//!   SHA-256 and real Ed25519.
//! - Private key material is never serialized or logged.

pub mod ed25519;
pub mod key_provider;
pub mod merkle;
pub mod sha256;

pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use key_provider::{
    EnvKeyProvider, KeyProvider, LocalKeyProvider, RotatingKeyHandle, DEFAULT_KEY_ENV_VAR,
};
pub use merkle::{verify_inclusion, MerkleLeaf, MerkleProof, MerkleTree, PathSide, PathStep};
pub use sha256::{content_hash, hash_bytes, privacy_preserving_message_hash, MessageSetHasher};
