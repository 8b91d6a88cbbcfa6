//! # Merkle Tree
//!
//! Binds an ordered list of evidentiary digests (one per batch proof) into a
//! single root. Order is part of the commitment.
//!
//! ## Construction rule
//!
//! Domain-separated SHA-256 over raw 32-byte digests:
//! - One leaf: `root = SHA256(0x00 || leaf)`. A tree of one is never equal
//!   to the bare leaf digest.
//! - N >= 2 leaves: level 0 is the raw leaf digests, and each parent is
//!   `SHA256(0x01 || left || right)`. On an odd-sized level the last node is
//!   paired with itself.
//!
//! Leaf hashes must be 64 hex characters. They are normalized to lowercase
//! at construction, so a remote verifier hashing the same digests reproduces
//! the same root.

use serde::{Deserialize, Serialize};

use attest_core::digest::{bytes_to_hex, hex_to_32bytes};
use attest_core::{CryptoError, Sha256Accumulator};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// A named, hashed unit of evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleLeaf {
    /// Caller-chosen label. Not hashed.
    pub id: String,
    /// 64-char lowercase hex digest. The only field that enters the root.
    pub hash: String,
    /// Associated payload, carried alongside. Not hashed.
    pub data: String,
}

impl MerkleLeaf {
    /// Build a leaf.
    pub fn new(id: impl Into<String>, hash: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hash: hash.into(),
            data: data.into(),
        }
    }
}

/// Binary Merkle tree over a non-empty ordered leaf sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleTree {
    leaves: Vec<MerkleLeaf>,
    root_hash: String,
}

/// Which side of the running hash a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSide {
    /// Sibling is hashed before the running hash.
    Left,
    /// Sibling is hashed after the running hash.
    Right,
}

/// One sibling on the path from a leaf to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    /// Side of the sibling.
    pub side: PathSide,
    /// Sibling node hash.
    pub hash: String,
}

/// Standalone inclusion proof for one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    /// Position of the leaf.
    pub leaf_index: usize,
    /// The leaf's own digest, before wrapping.
    pub leaf_hash: String,
    /// Siblings from the leaf level upward.
    pub path: Vec<PathStep>,
    /// Root the path must reproduce.
    pub root: String,
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

fn leaf_wrap(leaf: &[u8; 32]) -> [u8; 32] {
    let mut acc = Sha256Accumulator::new();
    acc.update(&[LEAF_PREFIX]);
    acc.update(leaf);
    acc.finalize_bytes()
}

fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut acc = Sha256Accumulator::new();
    acc.update(&[NODE_PREFIX]);
    acc.update(left);
    acc.update(right);
    acc.finalize_bytes()
}

/// Build every level bottom-up. `levels[0]` is the leaf level; the last
/// level has exactly one node. Only meaningful for two or more leaves.
fn build_levels(leaves: Vec<[u8; 32]>) -> Vec<Vec<[u8; 32]>> {
    let mut levels = vec![leaves];
    while let Some(current) = levels.last().filter(|level| level.len() > 1) {
        let next = current
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                node_hash(left, right)
            })
            .collect();
        levels.push(next);
    }
    levels
}

fn compute_root(leaves: &[[u8; 32]]) -> Result<[u8; 32], CryptoError> {
    match leaves {
        [] => Err(CryptoError::EmptyTree),
        [only] => Ok(leaf_wrap(only)),
        _ => build_levels(leaves.to_vec())
            .last()
            .and_then(|level| level.first().copied())
            .ok_or_else(|| CryptoError::CorruptTree("no root level".to_string())),
    }
}

fn decode_leaves(leaves: &[MerkleLeaf]) -> Result<Vec<[u8; 32]>, CryptoError> {
    leaves
        .iter()
        .enumerate()
        .map(|(i, leaf)| {
            hex_to_32bytes(&leaf.hash).map_err(|e| {
                CryptoError::DigestError(format!("leaf {i} ({}) hash: {e}", leaf.id))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MerkleTree
// ---------------------------------------------------------------------------

impl MerkleTree {
    /// Build a tree over `leaves` in the given order.
    ///
    /// Fails with `EmptyTree` for zero leaves and `DigestError` when a leaf
    /// hash is not a 64-char hex digest.
    pub fn new(mut leaves: Vec<MerkleLeaf>) -> Result<Self, CryptoError> {
        for leaf in &mut leaves {
            leaf.hash = leaf.hash.trim().to_ascii_lowercase();
        }
        let digests = decode_leaves(&leaves)?;
        let root_hash = bytes_to_hex(&compute_root(&digests)?);
        tracing::debug!(
            leaf_count = leaves.len(),
            root = %&root_hash[..16],
            "merkle tree built"
        );
        Ok(Self { leaves, root_hash })
    }

    /// Hex root.
    pub fn root_hash(&self) -> &str {
        &self.root_hash
    }

    /// Leaves in commitment order.
    pub fn leaves(&self) -> &[MerkleLeaf] {
        &self.leaves
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Recompute the root from the stored leaves and compare.
    ///
    /// Returns `Ok(false)` on a root mismatch. Errors only when the stored
    /// leaves themselves are unusable (none, or a non-digest hash), which
    /// can only happen to a tree that was deserialized or mutated.
    pub fn verify(&self) -> Result<bool, CryptoError> {
        if self.leaves.is_empty() {
            return Err(CryptoError::CorruptTree("tree has no leaves".to_string()));
        }
        let digests =
            decode_leaves(&self.leaves).map_err(|e| CryptoError::CorruptTree(e.to_string()))?;
        let root = compute_root(&digests)?;
        Ok(bytes_to_hex(&root) == self.root_hash.trim().to_ascii_lowercase())
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn inclusion_proof(&self, index: usize) -> Result<MerkleProof, CryptoError> {
        let leaf = self.leaves.get(index).ok_or_else(|| {
            CryptoError::CorruptTree(format!(
                "leaf index {index} out of range for {} leaves",
                self.leaves.len()
            ))
        })?;
        let digests = decode_leaves(&self.leaves)?;

        let mut path = Vec::new();
        if digests.len() > 1 {
            let levels = build_levels(digests);
            let mut pos = index;
            for level in &levels[..levels.len() - 1] {
                let (side, sibling_pos) = if pos % 2 == 0 {
                    // Odd tail pairs with itself.
                    (PathSide::Right, (pos + 1).min(level.len() - 1))
                } else {
                    (PathSide::Left, pos - 1)
                };
                path.push(PathStep {
                    side,
                    hash: bytes_to_hex(&level[sibling_pos]),
                });
                pos /= 2;
            }
        }

        Ok(MerkleProof {
            leaf_index: index,
            leaf_hash: leaf.hash.clone(),
            path,
            root: self.root_hash.clone(),
        })
    }
}

/// Check an inclusion proof against the root it carries.
///
/// Never panics; malformed hex or a wrong path yields `false`.
pub fn verify_inclusion(proof: &MerkleProof) -> bool {
    let Ok(leaf) = hex_to_32bytes(&proof.leaf_hash) else {
        return false;
    };
    let Ok(root) = hex_to_32bytes(&proof.root) else {
        return false;
    };
    if proof.path.is_empty() {
        return leaf_wrap(&leaf) == root;
    }
    let mut current = leaf;
    for step in &proof.path {
        let Ok(sibling) = hex_to_32bytes(&step.hash) else {
            return false;
        };
        current = match step.side {
            PathSide::Left => node_hash(&sibling, &current),
            PathSide::Right => node_hash(&current, &sibling),
        };
    }
    current == root
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
