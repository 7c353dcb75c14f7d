//! Password protection of RSA private keys.
//!
//! A private key is encrypted with AES-256-CBC under a key derived from
//! the password with PBKDF2 and a fresh 16-byte salt.  Salt and IV are
//! stored next to the ciphertext, all three as base64.
//!
//! There is no MAC.  A wrong password is detected by the padding check,
//! and as a second line the decrypted bytes must parse as a PKCS#8 RSA
//! key; either failure is reported as `AuthenticationFailed`.

use zeroize::Zeroizing;

use crate::crypto::asymmetric;
use crate::crypto::encoding;
use crate::crypto::kdf::{self, Pbkdf2Params, SALT_LEN};
use crate::crypto::symmetric::{self, IV_LEN};
use crate::errors::{KeyVaultError, Result};

/// AES key size used to wrap private keys.
const WRAP_KEY_BITS: u32 = 256;

/// A password-encrypted private key with the parameters needed to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPrivateKey {
    /// Base64 AES-CBC ciphertext of the DER private key.
    pub ciphertext: String,
    /// Base64 16-byte PBKDF2 salt.
    pub salt: String,
    /// Base64 16-byte CBC IV.
    pub iv: String,
}

/// Encrypt an encoded private key under `password`.
///
/// Generates a fresh salt and IV on every call.
pub fn encrypt_private_key(
    private_key: &str,
    password: &str,
    params: &Pbkdf2Params,
) -> Result<EncryptedPrivateKey> {
    let der = Zeroizing::new(encoding::decode(private_key)?);

    let salt = kdf::generate_salt();
    let iv = symmetric::generate_iv();
    let key = kdf::derive_key_with_params(password.as_bytes(), &salt, WRAP_KEY_BITS, params)?;

    let ciphertext = symmetric::encrypt(&der, &key, &iv)?;

    Ok(EncryptedPrivateKey {
        ciphertext: encoding::encode(&ciphertext),
        salt: encoding::encode(&salt),
        iv: encoding::encode(&iv),
    })
}

/// Decrypt a private key produced by `encrypt_private_key`.
///
/// Returns the encoded private key; it is zeroized when dropped and must
/// never be written back to storage in this form.
pub fn decrypt_private_key(
    encrypted: &EncryptedPrivateKey,
    password: &str,
    params: &Pbkdf2Params,
) -> Result<Zeroizing<String>> {
    let ciphertext = encoding::decode(&encrypted.ciphertext)?;
    let salt = encoding::decode(&encrypted.salt)?;
    let iv = encoding::decode(&encrypted.iv)?;

    if salt.len() != SALT_LEN {
        return Err(KeyVaultError::Validation(format!(
            "salt must be {SALT_LEN} bytes (got {})",
            salt.len()
        )));
    }
    if iv.len() != IV_LEN {
        return Err(KeyVaultError::Validation(format!(
            "IV must be {IV_LEN} bytes (got {})",
            iv.len()
        )));
    }

    let key = kdf::derive_key_with_params(password.as_bytes(), &salt, WRAP_KEY_BITS, params)?;
    let der = symmetric::decrypt(&ciphertext, &key, &iv).map_err(|e| match e {
        KeyVaultError::DecryptionFailed => KeyVaultError::AuthenticationFailed,
        other => other,
    })?;
    let der = Zeroizing::new(der);

    let private_key = Zeroizing::new(encoding::encode(&der));
    if asymmetric::parse_private_key(&private_key).is_err() {
        return Err(KeyVaultError::AuthenticationFailed);
    }

    Ok(private_key)
}
