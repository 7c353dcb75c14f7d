//! RSA key pairs and PKCS#1 v1.5 encryption.
//!
//! Keys travel as "encoded blobs": standard base64 of the DER encoding,
//! SubjectPublicKeyInfo for public keys and PKCS#8 for private keys.
//! Ciphertexts are base64 as well.
//!
//! PKCS#1 v1.5 padding is randomized, so encrypting the same message
//! twice yields different ciphertexts.  It costs 11 bytes of every
//! block, which fixes the maximum plaintext length at
//! `key_size_bytes - 11`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::crypto::encoding;
use crate::errors::{KeyVaultError, Result};

/// Smallest RSA modulus we will generate.
pub const MIN_KEY_BITS: u32 = 1024;

/// Largest RSA modulus we will generate.
///
/// Matches `RsaPublicKey::MAX_SIZE`: SPKI decoding rejects anything
/// larger, so a bigger key could never be used for encryption.
pub const MAX_KEY_BITS: u32 = RsaPublicKey::MAX_SIZE as u32;

/// Bytes of every block consumed by PKCS#1 v1.5 padding.
pub const PKCS1_OVERHEAD: usize = 11;

/// A freshly generated RSA key pair, both halves as encoded blobs.
#[derive(Clone)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: Zeroizing<String>,
    pub bits: u32,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("bits", &self.bits)
            .finish()
    }
}

/// Generate an RSA key pair with a modulus of `bits` bits.
///
/// This is CPU-bound and takes seconds at 4096 bits; use
/// `spawn_key_pair` to run it off the calling thread.
pub fn generate_key_pair(bits: u32) -> Result<KeyPair> {
    check_key_bits(bits)?;

    log::debug!("generating {bits}-bit RSA key pair");
    let private = RsaPrivateKey::new(&mut OsRng, bits as usize)
        .map_err(|e| KeyVaultError::KeyGenerationFailed(format!("RSA key generation: {e}")))?;
    let public = RsaPublicKey::from(&private);

    let private_der = private
        .to_pkcs8_der()
        .map_err(|e| KeyVaultError::KeyGenerationFailed(format!("PKCS#8 encoding: {e}")))?;
    let public_der = public
        .to_public_key_der()
        .map_err(|e| KeyVaultError::KeyGenerationFailed(format!("SPKI encoding: {e}")))?;

    Ok(KeyPair {
        public_key: encoding::encode(public_der.as_bytes()),
        private_key: Zeroizing::new(encoding::encode(private_der.as_bytes())),
        bits,
    })
}

fn check_key_bits(bits: u32) -> Result<()> {
    if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&bits) {
        return Err(KeyVaultError::Validation(format!(
            "RSA key size must be between {MIN_KEY_BITS} and {MAX_KEY_BITS} bits (got {bits})"
        )));
    }
    if bits % 8 != 0 {
        return Err(KeyVaultError::Validation(format!(
            "RSA key size must be a multiple of 8 bits (got {bits})"
        )));
    }
    Ok(())
}

/// Encrypt a UTF-8 string with an encoded public key.
///
/// Returns the base64 ciphertext.  Fails with `Validation` when the
/// plaintext is longer than `key_size_bytes - 11`.
pub fn encrypt(plaintext: &str, public_key: &str) -> Result<String> {
    let key = parse_public_key(public_key)?;
    let max = max_plaintext_len(&key);
    let data = plaintext.as_bytes();

    if data.len() > max {
        return Err(KeyVaultError::Validation(format!(
            "plaintext is {} bytes but a {}-bit key can encrypt at most {max} bytes",
            data.len(),
            key.size() * 8
        )));
    }

    let ciphertext = key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
        .map_err(|e| KeyVaultError::EncryptionFailed(format!("RSA encryption: {e}")))?;
    Ok(encoding::encode(&ciphertext))
}

/// Decrypt a base64 ciphertext with an encoded private key.
///
/// Malformed ciphertext, a mismatched key, or a non-UTF-8 result all
/// fail with `DecryptionFailed`.
pub fn decrypt(ciphertext: &str, private_key: &str) -> Result<String> {
    let key = parse_private_key(private_key)?;
    let data = encoding::decode(ciphertext).map_err(|_| KeyVaultError::DecryptionFailed)?;

    let plaintext = key
        .decrypt(Pkcs1v15Encrypt, &data)
        .map_err(|_| KeyVaultError::DecryptionFailed)?;
    String::from_utf8(plaintext).map_err(|_| KeyVaultError::DecryptionFailed)
}

/// Structural check that `encoded` is a base64 SubjectPublicKeyInfo
/// holding an RSA key.  Says nothing about where the key came from.
pub fn is_valid_public_key(encoded: &str) -> bool {
    if encoded.trim().is_empty() {
        return false;
    }
    parse_public_key(encoded).is_ok()
}

/// Modulus size in bits of an encoded public key.
pub fn public_key_bits(public_key: &str) -> Result<u32> {
    let key = parse_public_key(public_key)?;
    u32::try_from(key.size() * 8)
        .map_err(|_| KeyVaultError::Validation("RSA modulus is too large".into()))
}

/// Largest plaintext, in bytes, that `key` can encrypt in one block.
pub fn max_plaintext_len(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(PKCS1_OVERHEAD)
}

pub(crate) fn parse_public_key(encoded: &str) -> Result<RsaPublicKey> {
    let der = encoding::decode(encoded)?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| KeyVaultError::Validation(format!("not an RSA public key: {e}")))
}

pub(crate) fn parse_private_key(encoded: &str) -> Result<RsaPrivateKey> {
    let der = Zeroizing::new(encoding::decode(encoded)?);
    RsaPrivateKey::from_pkcs8_der(&der)
        .map_err(|e| KeyVaultError::Validation(format!("not an RSA private key: {e}")))
}

// ---------------------------------------------------------------------------
// Background generation with cancellation
// ---------------------------------------------------------------------------

/// Shared flag used to ask a background job to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a key pair being generated on a worker thread.
///
/// A cancelled job never hands out its key material: `wait` returns
/// `Cancelled` and the generated pair is dropped (and zeroized).
pub struct KeyPairJob {
    token: CancellationToken,
    handle: JoinHandle<Result<KeyPair>>,
}

impl KeyPairJob {
    /// A token that cancels this job when triggered.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Result<KeyPair> {
        let outcome = self.handle.join().map_err(|_| {
            KeyVaultError::KeyGenerationFailed("key generation worker panicked".into())
        })?;

        if self.token.is_cancelled() {
            log::debug!("discarding key pair from cancelled job");
            return Err(KeyVaultError::Cancelled);
        }
        outcome
    }
}

/// Start generating a key pair on a new thread.
///
/// The key size is validated up front so bad input fails immediately.
pub fn spawn_key_pair(bits: u32) -> Result<KeyPairJob> {
    check_key_bits(bits)?;

    let token = CancellationToken::new();
    let worker_token = token.clone();
    let handle = thread::Builder::new()
        .name("rsa-keygen".into())
        .spawn(move || {
            if worker_token.is_cancelled() {
                return Err(KeyVaultError::Cancelled);
            }
            generate_key_pair(bits)
        })?;

    Ok(KeyPairJob { token, handle })
}
