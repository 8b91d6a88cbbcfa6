//! # Canonical Serialization — JCS-Compatible Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! used in digest computation and signing across the attestation workspace.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()` (or `from_value()`), which
//! serializes with RFC 8785 (JSON Canonicalization Scheme): sorted keys,
//! compact separators, and ECMAScript shortest round-trip number formatting.
//!
//! A remote verifier that reconstructs `resultHash` or `batchHash` from the
//! uploaded JSON must apply the same scheme. Any other serializer produces a
//! different byte sequence for the same logical value.
//!
//! ## Numbers
//!
//! Finite floats are permitted: personality traits and trust factors are
//! bounded scalars and JCS fixes their textual form. Non-finite values never
//! reach this layer as numbers; `Score` serializes them as tagged strings so
//! that distinct invalid values still hash differently.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - The only constructors are `CanonicalBytes::new()` and `from_value()`.
/// - Object keys are sorted by UTF-16 code units (RFC 8785 §3.2.3).
/// - No insignificant whitespace.
/// - Numbers use the ECMAScript `Number.prototype.toString` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value cannot
    /// be represented as JSON (e.g. a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Construct canonical bytes from an already-built JSON value.
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the wrapper and return the owned bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
