//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! Every password guess costs an attacker the full iteration count of
//! HMAC-SHA256 rounds.  The iteration count is configurable via
//! `Pbkdf2Params` (loaded from `.keyvault.toml` or sensible defaults).
//!
//! The derived key length follows the requested AES key size, so the
//! same password + salt yields different keys for 128, 192 and 256 bits
//! only in length (shorter keys are prefixes of longer ones).

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::symmetric::KeySize;
use crate::errors::{KeyVaultError, Result};

/// Length of a generated salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Configurable PBKDF2 parameters.
///
/// Maps 1:1 to `pbkdf2_iterations` in `Settings`.  Export envelopes do
/// not record the iteration count, so exporter and importer must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pbkdf2Params {
    /// Number of HMAC-SHA256 iterations (default: 10 000).
    pub iterations: u32,
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derive a `target_key_bits / 8` byte key from a password and salt
/// using the default parameters.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    target_key_bits: u32,
) -> Result<Zeroizing<Vec<u8>>> {
    derive_key_with_params(password, salt, target_key_bits, &Pbkdf2Params::default())
}

/// Derive a key with explicit PBKDF2 parameters.
///
/// The same password + salt + params always produce the same key.
/// `target_key_bits` must be an AES key size (128, 192 or 256).
pub fn derive_key_with_params(
    password: &[u8],
    salt: &[u8],
    target_key_bits: u32,
    params: &Pbkdf2Params,
) -> Result<Zeroizing<Vec<u8>>> {
    if salt.is_empty() {
        return Err(KeyVaultError::KeyDerivationFailed(
            "salt must not be empty".into(),
        ));
    }
    if params.iterations < 1 {
        return Err(KeyVaultError::KeyDerivationFailed(
            "PBKDF2 iterations must be at least 1".into(),
        ));
    }
    let key_size = KeySize::from_bits(target_key_bits).map_err(|_| {
        KeyVaultError::KeyDerivationFailed(format!(
            "target key size must be 128, 192 or 256 bits (got {target_key_bits})"
        ))
    })?;

    let mut key = Zeroizing::new(vec![0u8; key_size.byte_len()]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, params.iterations, &mut key);

    Ok(key)
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}
