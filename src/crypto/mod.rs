//! Cryptographic primitives for KeyVault.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 password-based key derivation (`kdf`)
//! - AES-CBC encryption with PKCS#7 padding (`symmetric`)
//! - RSA key pairs and PKCS#1 v1.5 encryption (`asymmetric`)
//! - PEM wrapping and unwrapping of encoded keys (`pem`)
//! - Password protection of RSA private keys (`private_key`)
//! - Chunked stream/file encryption with progress reporting (`stream`)
//! - Owner-only file creation for key material (`secure_file`)

pub mod asymmetric;
pub mod encoding;
pub mod kdf;
pub mod pem;
pub mod private_key;
pub mod secure_file;
pub mod stream;
pub mod symmetric;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{derive_key, KeySize, generate_key_pair, ...};
pub use asymmetric::{generate_key_pair, spawn_key_pair, CancellationToken, KeyPair, KeyPairJob};
pub use kdf::{derive_key, derive_key_with_params, generate_salt, Pbkdf2Params};
pub use pem::{extract_base64_from_pem, private_key_to_pem, public_key_to_pem, PemKind};
pub use private_key::{decrypt_private_key, encrypt_private_key, EncryptedPrivateKey};
pub use stream::{NoProgress, ProgressListener};
pub use symmetric::KeySize;
