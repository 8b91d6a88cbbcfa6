//! Common view over the two bundle shapes, used by the upload gate.

use serde::{Deserialize, Serialize};

/// Which bundle shape an attestation has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttestationKind {
    Single,
    Batched,
}

impl std::fmt::Display for AttestationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Batched => f.write_str("batched"),
        }
    }
}

/// A finished bundle that can be handed to the upload collaborator.
pub trait Attestation {
    fn kind(&self) -> AttestationKind;

    /// Structural validity of the bundle as carried on the wire.
    fn is_valid(&self) -> bool;

    /// Full cryptographic check: recomputed hashes, Merkle root, signatures.
    fn verify(&self) -> bool;

    fn model_hash(&self) -> &str;
}
