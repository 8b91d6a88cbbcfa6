//! # Content Digest — Content-Addressed Identifiers
//!
//! Defines `ContentDigest`, `DigestAlgorithm`, and the two SHA-256 paths
//! used throughout the attestation workspace:
//!
//! - [`sha256_digest()`] over `CanonicalBytes`, for structured payloads
//!   (analysis results, batches, public inputs).
//! - [`Sha256Accumulator`] over raw byte segments, for domain-separated
//!   constructions whose layout is fixed byte-for-byte (message-set hash,
//!   Merkle nodes, proof bindings).
//!
//! All digests render as 64 lowercase hex characters regardless of input size.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::CryptoError;

/// The hash algorithm used to produce a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content-addressed digest with its algorithm tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Create a new content digest from raw bytes and algorithm.
    pub fn new(algorithm: DigestAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        bytes_to_hex(&self.bytes)
    }

    /// Parse a SHA-256 digest from a 64-character hex string.
    ///
    /// Accepts upper- or lowercase input and surrounding whitespace.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex_to_32bytes(hex)?;
        Ok(Self::new(DigestAlgorithm::Sha256, bytes))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Compute a SHA-256 content digest from canonical bytes.
///
/// Accepts only `&CanonicalBytes`, so every structured digest in the
/// workspace is reproducible by a verifier that applies JCS.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(DigestAlgorithm::Sha256, bytes)
}

/// Compute a SHA-256 hex string from canonical bytes.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    sha256_digest(data).to_hex()
}

/// Compute a SHA-256 hex string over arbitrary bytes.
///
/// This is the `hash(bytes) -> hex` primitive. It never fails and always
/// returns 64 lowercase hex characters.
pub fn sha256_hex_bytes(data: &[u8]) -> String {
    let mut acc = Sha256Accumulator::new();
    acc.update(data);
    acc.finalize_hex()
}

/// Incremental SHA-256 over raw byte segments.
///
/// Used where a construction concatenates fixed-layout segments (domain
/// tags, length prefixes, raw 32-byte digests). Callers are responsible for
/// making the segment layout unambiguous.
#[derive(Clone, Default)]
pub struct Sha256Accumulator {
    hasher: Sha256,
}

impl Sha256Accumulator {
    /// Start a new accumulator.
    pub fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    /// Append a raw byte segment.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Append a big-endian `u64` length or counter.
    pub fn update_u64(&mut self, n: u64) {
        self.hasher.update(n.to_be_bytes());
    }

    /// Append a length-prefixed byte segment.
    pub fn update_prefixed(&mut self, data: &[u8]) {
        self.update_u64(data.len() as u64);
        self.hasher.update(data);
    }

    /// Finish and return the raw 32-byte digest.
    pub fn finalize_bytes(self) -> [u8; 32] {
        let hash = self.hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash);
        out
    }

    /// Finish and return the digest as a `ContentDigest`.
    pub fn finalize(self) -> ContentDigest {
        ContentDigest::new(DigestAlgorithm::Sha256, self.finalize_bytes())
    }

    /// Finish and return the digest as lowercase hex.
    pub fn finalize_hex(self) -> String {
        bytes_to_hex(&self.finalize_bytes())
    }
}

impl std::fmt::Debug for Sha256Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sha256Accumulator(..)")
    }
}

// ---------------------------------------------------------------------------
// Hex utilities (no external hex crate dependency)
// ---------------------------------------------------------------------------

/// Encode bytes as lowercase hex.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode an even-length hex string into bytes.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, CryptoError> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(CryptoError::DigestError(
            "hex string must have even length".to_string(),
        ));
    }
    if !hex.is_ascii() {
        return Err(CryptoError::DigestError("hex string must be ASCII".to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| CryptoError::DigestError(format!("invalid hex at position {i}: {e}")))
        })
        .collect()
}

/// Decode a 64-char hex string to 32 bytes.
pub fn hex_to_32bytes(hex: &str) -> Result<[u8; 32], CryptoError> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(CryptoError::DigestError(format!(
            "expected 64 hex chars, got {}",
            hex.len()
        )));
    }
    let bytes = hex_to_bytes(hex)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Returns true if `s` is a 64-char hex digest.
pub fn is_hex_32(s: &str) -> bool {
    let s = s.trim();
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_digest_deterministic() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1, "b": 2})).unwrap();
        let d1 = sha256_digest(&cb);
        let d2 = sha256_digest(&cb);
        assert_eq!(d1, d2);
        assert_eq!(d1.algorithm, DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_known_sha256_vector() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(
            sha256_hex(&cb),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_raw_hash_known_vector() {
        assert_eq!(
            sha256_hex_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fixed_length_output() {
        let big = vec![7u8; 1 << 20];
        assert_eq!(sha256_hex_bytes(&big).len(), 64);
        assert_eq!(sha256_hex_bytes(b"x").len(), 64);
    }

    #[test]
    fn test_accumulator_matches_one_shot() {
        let mut acc = Sha256Accumulator::new();
        acc.update(b"ab");
        acc.update(b"c");
        assert_eq!(acc.finalize_hex(), sha256_hex_bytes(b"abc"));
    }

    #[test]
    fn test_prefixed_segments_are_unambiguous() {
        let mut a = Sha256Accumulator::new();
        a.update_prefixed(b"ab");
        a.update_prefixed(b"c");
        let mut b = Sha256Accumulator::new();
        b.update_prefixed(b"a");
        b.update_prefixed(b"bc");
        assert_ne!(a.finalize_hex(), b.finalize_hex());
    }

    #[test]
    fn test_content_digest_display() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let s = format!("{}", sha256_digest(&cb));
        assert!(s.starts_with("sha256:"));
        assert_eq!(s.len(), 7 + 64);
    }

    #[test]
    fn test_from_hex_roundtrip() {
        let d = sha256_digest(&CanonicalBytes::new(&"x").unwrap());
        let parsed = ContentDigest::from_hex(&d.to_hex().to_uppercase()).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(ContentDigest::from_hex("abcd").is_err());
        assert!(ContentDigest::from_hex(&"zz".repeat(32)).is_err());
        assert!(!is_hex_32("m1"));
        assert!(is_hex_32(&"ab".repeat(32)));
    }
}
