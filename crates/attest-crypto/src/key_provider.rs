//! # Key Provider Abstraction
//!
//! Proof code never looks up a signing key from ambient state. It receives
//! a [`KeyProvider`] handle from the key-custody collaborator and signs
//! through it.
//!
//! - [`LocalKeyProvider`]: in-memory key for development and testing.
//! - [`EnvKeyProvider`]: hex-encoded 32-byte seed from an environment
//!   variable (default `ATTEST_SIGNING_KEY`).
//! - [`RotatingKeyHandle`]: a shared handle that supports concurrent signing,
//!   key rotation, and revocation.
//!
//! ## Concurrency
//!
//! `RotatingKeyHandle` keeps its key behind a `parking_lot::RwLock`. Signing
//! takes a read lock, so any number of signatures may be in flight at once.
//! `rotate()` and `revoke()` take the write lock and therefore wait for every
//! in-flight signature to finish. No lock is held beyond a single call.

use parking_lot::RwLock;

use crate::ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use attest_core::{CanonicalBytes, CryptoError};

/// Environment variable read by [`EnvKeyProvider::from_default_env`].
pub const DEFAULT_KEY_ENV_VAR: &str = "ATTEST_SIGNING_KEY";

/// Trait for Ed25519 key custody backends.
pub trait KeyProvider: Send + Sync {
    /// Sign canonicalized data with the managed key.
    fn sign(&self, data: &CanonicalBytes) -> Result<Ed25519Signature, CryptoError>;

    /// The public key that currently verifies this provider's signatures.
    fn public_key(&self) -> Result<Ed25519PublicKey, CryptoError>;

    /// Sign and report the public key of the key that signed, atomically
    /// with respect to rotation.
    fn sign_with_public_key(
        &self,
        data: &CanonicalBytes,
    ) -> Result<(Ed25519Signature, Ed25519PublicKey), CryptoError> {
        let public_key = self.public_key()?;
        let signature = self.sign(data)?;
        Ok((signature, public_key))
    }

    /// Human-readable name for this provider (for diagnostics/logging).
    fn provider_name(&self) -> &str;
}

// ─── LocalKeyProvider ────────────────────────────────────────────────────

/// In-memory key provider for development and testing.
pub struct LocalKeyProvider {
    key: Ed25519KeyPair,
}

impl LocalKeyProvider {
    /// Wrap an existing key pair.
    pub fn new(key: Ed25519KeyPair) -> Self {
        Self { key }
    }

    /// Generate an ephemeral key using the OS CSPRNG.
    pub fn generate() -> Self {
        Self::new(Ed25519KeyPair::generate())
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(Ed25519KeyPair::from_seed(seed))
    }
}

impl KeyProvider for LocalKeyProvider {
    fn sign(&self, data: &CanonicalBytes) -> Result<Ed25519Signature, CryptoError> {
        Ok(self.key.sign(data))
    }

    fn public_key(&self) -> Result<Ed25519PublicKey, CryptoError> {
        Ok(self.key.public_key())
    }

    fn provider_name(&self) -> &str {
        "LocalKeyProvider"
    }
}

// ─── EnvKeyProvider ──────────────────────────────────────────────────────

/// Loads a signing key seed from an environment variable.
///
/// The variable must hold 64 hex characters. The key is read once at
/// construction and held in memory (zeroized on drop).
///
/// ```bash
/// export ATTEST_SIGNING_KEY="deadbeef..."  # 64 hex chars
/// ```
pub struct EnvKeyProvider {
    key: Ed25519KeyPair,
    var_name: String,
}

impl EnvKeyProvider {
    /// Load the key from `ATTEST_SIGNING_KEY`.
    pub fn from_default_env() -> Result<Self, CryptoError> {
        Self::from_env(DEFAULT_KEY_ENV_VAR)
    }

    /// Load the key from the named environment variable.
    pub fn from_env(var_name: &str) -> Result<Self, CryptoError> {
        let hex = std::env::var(var_name)
            .map_err(|_| CryptoError::KeyError(format!("environment variable {var_name} not set")))?;
        let key = Ed25519KeyPair::from_seed_hex(&hex)
            .map_err(|e| CryptoError::KeyError(format!("{var_name}: {e}")))?;
        Ok(Self {
            key,
            var_name: var_name.to_string(),
        })
    }

    /// The environment variable this provider was loaded from.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

impl KeyProvider for EnvKeyProvider {
    fn sign(&self, data: &CanonicalBytes) -> Result<Ed25519Signature, CryptoError> {
        Ok(self.key.sign(data))
    }

    fn public_key(&self) -> Result<Ed25519PublicKey, CryptoError> {
        Ok(self.key.public_key())
    }

    fn provider_name(&self) -> &str {
        "EnvKeyProvider"
    }
}

// ─── RotatingKeyHandle ───────────────────────────────────────────────────

struct HandleState {
    key: Ed25519KeyPair,
    generation: u64,
    revoked: bool,
}

/// Shared signing handle with rotation and revocation.
///
/// Once revoked, every signature request fails with
/// `CryptoError::SigningFailure` until a new key is installed by `rotate()`.
pub struct RotatingKeyHandle {
    state: RwLock<HandleState>,
}

impl RotatingKeyHandle {
    /// Generation 0, not revoked.
    pub fn new(key: Ed25519KeyPair) -> Self {
        Self {
            state: RwLock::new(HandleState {
                key,
                generation: 0,
                revoked: false,
            }),
        }
    }

    /// Install a new key. Blocks until in-flight signatures complete.
    ///
    /// Returns the public key that was replaced.
    pub fn rotate(&self, key: Ed25519KeyPair) -> Ed25519PublicKey {
        let mut state = self.state.write();
        let previous = state.key.public_key();
        state.key = key;
        state.generation += 1;
        state.revoked = false;
        tracing::info!(generation = state.generation, "signing key rotated");
        previous
    }

    /// Mark the current key unusable.
    pub fn revoke(&self) {
        let mut state = self.state.write();
        state.revoked = true;
        tracing::warn!(generation = state.generation, "signing key revoked");
    }

    /// Number of rotations performed so far.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Whether the current key was revoked.
    pub fn is_revoked(&self) -> bool {
        self.state.read().revoked
    }
}

fn revoked_error(generation: u64) -> CryptoError {
    CryptoError::SigningFailure(format!("signing key generation {generation} is revoked"))
}

impl KeyProvider for RotatingKeyHandle {
    fn sign(&self, data: &CanonicalBytes) -> Result<Ed25519Signature, CryptoError> {
        let state = self.state.read();
        if state.revoked {
            return Err(revoked_error(state.generation));
        }
        Ok(state.key.sign(data))
    }

    fn public_key(&self) -> Result<Ed25519PublicKey, CryptoError> {
        let state = self.state.read();
        if state.revoked {
            return Err(revoked_error(state.generation));
        }
        Ok(state.key.public_key())
    }

    fn sign_with_public_key(
        &self,
        data: &CanonicalBytes,
    ) -> Result<(Ed25519Signature, Ed25519PublicKey), CryptoError> {
        let state = self.state.read();
        if state.revoked {
            return Err(revoked_error(state.generation));
        }
        Ok((state.key.sign(data), state.key.public_key()))
    }

    fn provider_name(&self) -> &str {
        "RotatingKeyHandle"
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────
