//! Wire format for export bundles.
//!
//! Two shapes share one file:
//!
//! ```text
//! plaintext:  { "formatVersion": "1.0", "exportedAt": ..., ... }   (pretty JSON)
//! encrypted:  KEYVAULT_KEY_EXPORT|<salt b64>|<iv b64>|<ciphertext b64>
//! ```
//!
//! The encrypted shape wraps the plaintext JSON in AES-256-CBC under a
//! PBKDF2 key.  It carries no iteration count, so both sides must use the
//! same `Pbkdf2Params`.

use crate::crypto::encoding;
use crate::crypto::kdf::{self, Pbkdf2Params, SALT_LEN};
use crate::crypto::symmetric::{self, IV_LEN};
use crate::errors::{KeyVaultError, Result};

use super::ExportBundle;

/// First field of every encrypted bundle.  JSON never starts with it.
pub const MAGIC_PREFIX: &str = "KEYVAULT_KEY_EXPORT";

/// Value written to `formatVersion`.
pub const FORMAT_VERSION: &str = "1.0";

const DELIMITER: char = '|';
const FIELD_COUNT: usize = 4;
const ENVELOPE_KEY_BITS: u32 = 256;

/// Encode `bundle`, wrapping it in a password envelope when `password`
/// is present and non-empty.
pub fn serialize(
    bundle: &ExportBundle,
    password: Option<&str>,
    params: &Pbkdf2Params,
) -> Result<Vec<u8>> {
    let json = serde_json::to_string_pretty(bundle)
        .map_err(|e| KeyVaultError::SerializationError(format!("export bundle: {e}")))?;

    match password.filter(|p| !p.is_empty()) {
        None => Ok(json.into_bytes()),
        Some(password) => seal(json.as_bytes(), password, params).map(String::into_bytes),
    }
}

/// Decode bytes produced by `serialize`.
///
/// Encrypted input needs a password; without one, or with the wrong one,
/// this fails with `AuthenticationFailed`.  A malformed envelope is a
/// `Validation` error.
pub fn deserialize(
    bytes: &[u8],
    password: Option<&str>,
    params: &Pbkdf2Params,
) -> Result<ExportBundle> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| KeyVaultError::Validation("export file is not UTF-8 text".into()))?;

    if !is_encrypted(bytes) {
        return serde_json::from_str(text)
            .map_err(|e| KeyVaultError::SerializationError(format!("export bundle: {e}")));
    }

    let password = password
        .filter(|p| !p.is_empty())
        .ok_or(KeyVaultError::AuthenticationFailed)?;
    let json = open(text, password, params)?;

    // Padding can validate by chance under a wrong key; the JSON cannot.
    serde_json::from_slice(&json).map_err(|_| KeyVaultError::AuthenticationFailed)
}

/// True when `bytes` start with the encrypted-bundle prefix.
pub fn is_encrypted(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(MAGIC_PREFIX.as_bytes())
}

fn seal(plaintext: &[u8], password: &str, params: &Pbkdf2Params) -> Result<String> {
    let salt = kdf::generate_salt();
    let iv = symmetric::generate_iv();
    let key = kdf::derive_key_with_params(password.as_bytes(), &salt, ENVELOPE_KEY_BITS, params)?;
    let ciphertext = symmetric::encrypt(plaintext, &key, &iv)?;

    Ok([
        MAGIC_PREFIX.to_string(),
        encoding::encode(&salt),
        encoding::encode(&iv),
        encoding::encode(&ciphertext),
    ]
    .join(&DELIMITER.to_string()))
}

fn open(envelope: &str, password: &str, params: &Pbkdf2Params) -> Result<Vec<u8>> {
    let fields: Vec<&str> = envelope.trim().split(DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(KeyVaultError::Validation(format!(
            "encrypted export must have {FIELD_COUNT} fields (got {})",
            fields.len()
        )));
    }
    if fields[0] != MAGIC_PREFIX {
        return Err(KeyVaultError::Validation(format!(
            "unknown export prefix '{}'",
            fields[0]
        )));
    }

    let salt = encoding::decode(fields[1])?;
    let iv = encoding::decode(fields[2])?;
    let ciphertext = encoding::decode(fields[3])?;

    if salt.len() != SALT_LEN {
        return Err(KeyVaultError::Validation(format!(
            "export salt must be {SALT_LEN} bytes (got {})",
            salt.len()
        )));
    }
    if iv.len() != IV_LEN {
        return Err(KeyVaultError::Validation(format!(
            "export IV must be {IV_LEN} bytes (got {})",
            iv.len()
        )));
    }

    let key = kdf::derive_key_with_params(password.as_bytes(), &salt, ENVELOPE_KEY_BITS, params)?;
    symmetric::decrypt(&ciphertext, &key, &iv).map_err(|e| match e {
        KeyVaultError::DecryptionFailed => KeyVaultError::AuthenticationFailed,
        other => other,
    })
}
