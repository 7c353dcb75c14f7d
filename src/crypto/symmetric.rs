//! AES-CBC encryption with PKCS#7 padding.
//!
//! Supports AES-128, AES-192 and AES-256, selected by the key length.
//! There is no authentication tag: on decryption the only integrity
//! signal is whether the PKCS#7 padding is well formed, so a wrong key
//! is detected with high (not certain) probability.
//!
//! Layout of the text format produced by `encrypt_text`:
//!   base64( 16-byte salt | 16-byte IV | ciphertext )

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::encoding;
use crate::crypto::kdf::{self, Pbkdf2Params, SALT_LEN};
use crate::errors::{KeyVaultError, Result};

/// Size of the CBC initialization vector in bytes.
pub const IV_LEN: usize = 16;

/// AES block size in bytes.
pub const BLOCK_LEN: usize = 16;

pub(crate) type Aes128CbcEnc = cbc::Encryptor<Aes128>;
pub(crate) type Aes128CbcDec = cbc::Decryptor<Aes128>;
pub(crate) type Aes192CbcEnc = cbc::Encryptor<Aes192>;
pub(crate) type Aes192CbcDec = cbc::Decryptor<Aes192>;
pub(crate) type Aes256CbcEnc = cbc::Encryptor<Aes256>;
pub(crate) type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Supported AES key sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    /// Map a bit length to a key size, rejecting anything but 128/192/256.
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            128 => Ok(Self::Aes128),
            192 => Ok(Self::Aes192),
            256 => Ok(Self::Aes256),
            other => Err(KeyVaultError::Validation(format!(
                "AES key size must be 128, 192 or 256 bits (got {other})"
            ))),
        }
    }

    fn from_key_len(len: usize) -> Result<Self> {
        match len {
            16 => Ok(Self::Aes128),
            24 => Ok(Self::Aes192),
            32 => Ok(Self::Aes256),
            other => Err(KeyVaultError::Validation(format!(
                "AES key must be 16, 24 or 32 bytes (got {other})"
            ))),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Aes128 => 128,
            Self::Aes192 => 192,
            Self::Aes256 => 256,
        }
    }

    pub fn byte_len(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Encrypt `plaintext` with AES-CBC and PKCS#7 padding.
///
/// The AES variant is picked from the key length.  The output is always
/// a non-empty multiple of the block size.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_iv(iv)?;
    match KeySize::from_key_len(key.len())? {
        KeySize::Aes128 => cbc_encrypt::<Aes128CbcEnc>(plaintext, key, iv),
        KeySize::Aes192 => cbc_encrypt::<Aes192CbcEnc>(plaintext, key, iv),
        KeySize::Aes256 => cbc_encrypt::<Aes256CbcEnc>(plaintext, key, iv),
    }
}

/// Decrypt data produced by `encrypt`.
///
/// Fails with `DecryptionFailed` when the ciphertext is not a whole
/// number of blocks or the padding is invalid after decryption.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_iv(iv)?;
    let key_size = KeySize::from_key_len(key.len())?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(KeyVaultError::DecryptionFailed);
    }
    match key_size {
        KeySize::Aes128 => cbc_decrypt::<Aes128CbcDec>(ciphertext, key, iv),
        KeySize::Aes192 => cbc_decrypt::<Aes192CbcDec>(ciphertext, key, iv),
        KeySize::Aes256 => cbc_decrypt::<Aes256CbcDec>(ciphertext, key, iv),
    }
}

fn cbc_encrypt<E: KeyIvInit + BlockEncryptMut>(
    plaintext: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>> {
    let cipher = E::new_from_slices(key, iv)
        .map_err(|e| KeyVaultError::EncryptionFailed(format!("cipher init: {e}")))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn cbc_decrypt<D: KeyIvInit + BlockDecryptMut>(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>> {
    let cipher = D::new_from_slices(key, iv).map_err(|_| KeyVaultError::DecryptionFailed)?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| KeyVaultError::DecryptionFailed)
}

fn check_iv(iv: &[u8]) -> Result<()> {
    if iv.len() != IV_LEN {
        return Err(KeyVaultError::Validation(format!(
            "IV must be {IV_LEN} bytes (got {})",
            iv.len()
        )));
    }
    Ok(())
}

/// Generate a random AES key of `bits` length (128, 192 or 256).
pub fn generate_key(bits: u32) -> Result<Zeroizing<Vec<u8>>> {
    let size = KeySize::from_bits(bits)?;
    Ok(Zeroizing::new(generate_random_bytes(size.byte_len())))
}

/// Fill `n` bytes from the operating system's CSPRNG.
pub fn generate_random_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generate a random 16-byte IV.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

// ---------------------------------------------------------------------------
// Text encryption with a stored key or a password
// ---------------------------------------------------------------------------

/// Encrypt a UTF-8 string with either a base64 AES key or a password.
///
/// If `secret` decodes to exactly `key_size` bytes it is used as the raw
/// key; otherwise a key is derived from it with PBKDF2 and a fresh salt.
/// The salt is always embedded so the output format does not depend on
/// which kind of secret was used.
pub fn encrypt_text(
    plaintext: &str,
    secret: &str,
    key_size: KeySize,
    params: &Pbkdf2Params,
) -> Result<String> {
    let salt = kdf::generate_salt();
    let iv = generate_iv();
    let key = resolve_text_key(secret, &salt, key_size, params)?;

    let ciphertext = encrypt(plaintext.as_bytes(), &key, &iv)?;

    let mut output = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&iv);
    output.extend_from_slice(&ciphertext);
    Ok(encoding::encode(&output))
}

/// Decrypt a string produced by `encrypt_text`.
pub fn decrypt_text(
    encoded: &str,
    secret: &str,
    key_size: KeySize,
    params: &Pbkdf2Params,
) -> Result<String> {
    let data = encoding::decode(encoded).map_err(|_| KeyVaultError::DecryptionFailed)?;
    if data.len() < SALT_LEN + IV_LEN + BLOCK_LEN {
        return Err(KeyVaultError::DecryptionFailed);
    }

    let (salt, rest) = data.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);
    let key = resolve_text_key(secret, salt, key_size, params)?;

    let plaintext = decrypt(ciphertext, &key, iv)?;
    String::from_utf8(plaintext).map_err(|_| KeyVaultError::DecryptionFailed)
}

fn resolve_text_key(
    secret: &str,
    salt: &[u8],
    key_size: KeySize,
    params: &Pbkdf2Params,
) -> Result<Zeroizing<Vec<u8>>> {
    if let Ok(raw) = encoding::decode(secret) {
        if raw.len() == key_size.byte_len() {
            return Ok(Zeroizing::new(raw));
        }
    }
    kdf::derive_key_with_params(secret.as_bytes(), salt, key_size.bits(), params)
}
