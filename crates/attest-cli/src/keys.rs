//! # Keys Subcommand
//!
//! Seed generation and signing-key resolution.
//!
//! A key file holds the 32-byte Ed25519 seed as 64 hex characters. The
//! matching `.pub` file holds the 32-byte public key in the same encoding.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use rand::RngCore;
use zeroize::Zeroizing;

use attest_core::digest::bytes_to_hex;
use attest_crypto::{
    Ed25519KeyPair, EnvKeyProvider, KeyProvider, LocalKeyProvider, DEFAULT_KEY_ENV_VAR,
};

/// Arguments for `attest keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output directory for the key files.
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
    /// Prefix for the key filenames.
    #[arg(long, default_value = "attest")]
    pub prefix: String,
    /// Replace existing key files.
    #[arg(long)]
    pub force: bool,
}

pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    std::fs::create_dir_all(&args.output).with_context(|| {
        format!("failed to create output directory: {}", args.output.display())
    })?;

    let key_path = args.output.join(format!("{}.key", args.prefix));
    let pub_path = args.output.join(format!("{}.pub", args.prefix));
    if !args.force && (key_path.exists() || pub_path.exists()) {
        bail!(
            "refusing to overwrite {} (pass --force to replace)",
            key_path.display()
        );
    }

    let mut seed = Zeroizing::new([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut seed[..]);
    let pair = Ed25519KeyPair::from_seed(&seed);
    let seed_hex = Zeroizing::new(bytes_to_hex(&seed[..]));
    let pub_hex = pair.public_key().to_hex();

    std::fs::write(&key_path, seed_hex.as_bytes())
        .with_context(|| format!("failed to write private key: {}", key_path.display()))?;
    std::fs::write(&pub_path, &pub_hex)
        .with_context(|| format!("failed to write public key: {}", pub_path.display()))?;

    println!("OK: generated Ed25519 signing key");
    println!("  Private key: {}", key_path.display());
    println!("  Public key:  {}", pub_path.display());
    println!("  Public key (hex): {pub_hex}");
    Ok(0)
}

/// Resolve the signing key: `key_file` when given, else the environment.
pub fn load_key_provider(key_file: Option<&Path>) -> Result<Arc<dyn KeyProvider>> {
    match key_file {
        Some(path) => {
            let hex = Zeroizing::new(
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read key file: {}", path.display()))?,
            );
            let pair = Ed25519KeyPair::from_seed_hex(hex.trim())
                .with_context(|| format!("invalid key file: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "signing key loaded from file");
            Ok(Arc::new(LocalKeyProvider::new(pair)))
        }
        None => {
            let provider = EnvKeyProvider::from_default_env().with_context(|| {
                format!("no --key given and {DEFAULT_KEY_ENV_VAR} is not usable")
            })?;
            tracing::debug!(var = provider.var_name(), "signing key loaded from environment");
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::CanonicalBytes;

    #[test]
    fn keygen_output_loads_and_matches_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let args = KeygenArgs {
            output: dir.path().to_path_buf(),
            prefix: "dev".into(),
            force: false,
        };
        assert_eq!(run_keygen(&args).unwrap(), 0);

        let provider = load_key_provider(Some(&dir.path().join("dev.key"))).unwrap();
        let pub_hex = std::fs::read_to_string(dir.path().join("dev.pub")).unwrap();
        let pk = provider.public_key().unwrap();
        assert_eq!(pk.to_hex(), pub_hex);

        let data = CanonicalBytes::new(&serde_json::json!({"probe": 1})).unwrap();
        let sig = provider.sign(&data).unwrap();
        assert!(pk.verify(&data, &sig).is_ok());
    }

    #[test]
    fn keygen_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = KeygenArgs {
            output: dir.path().to_path_buf(),
            prefix: "dev".into(),
            force: false,
        };
        run_keygen(&args).unwrap();
        let first = std::fs::read_to_string(dir.path().join("dev.pub")).unwrap();
        assert!(run_keygen(&args).is_err());

        args.force = true;
        run_keygen(&args).unwrap();
        let second = std::fs::read_to_string(dir.path().join("dev.pub")).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_key_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.key");
        std::fs::write(&path, "not-hex").unwrap();
        assert!(load_key_provider(Some(&path)).is_err());
    }

    #[test]
    fn missing_key_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_key_provider(Some(&dir.path().join("absent.key"))).is_err());
    }
}
