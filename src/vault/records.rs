//! Key records persisted by the repository and carried in export bundles.
//!
//! Field names serialize in camelCase (`keyMaterial`, `isEncrypted`, ...)
//! so stored documents and export files share one schema.  Records are
//! never mutated in place by the repository: callers build a new record
//! and `save` it, which replaces any record with the same id.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::backend::Collection;
use crate::crypto::asymmetric::{self, KeyPair};
use crate::crypto::encoding;
use crate::crypto::kdf::Pbkdf2Params;
use crate::crypto::pem::{self, PemKind};
use crate::crypto::private_key::{self, EncryptedPrivateKey};
use crate::crypto::symmetric::{self, KeySize};
use crate::errors::{KeyVaultError, Result};

/// A record type the repository knows how to store.
pub trait KeyRecord: Clone + Serialize + DeserializeOwned {
    /// The collection this record type lives in.
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Check the record's invariants before it is persisted.
    fn validate(&self) -> Result<()>;
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(KeyVaultError::Validation("record id cannot be empty".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Symmetric keys
// ---------------------------------------------------------------------------

/// A stored AES key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetricKeyRecord {
    pub id: String,
    pub name: String,
    /// Base64 raw key bytes.
    pub key_material: String,
    pub key_size_bits: u32,
    /// Free-form tag describing what the key is for (e.g. "text", "file").
    pub purpose_tag: String,
    pub created_at: DateTime<Utc>,
}

impl SymmetricKeyRecord {
    /// Generate a fresh random key of `bits` length.
    pub fn generate(name: &str, bits: u32, purpose_tag: &str) -> Result<Self> {
        let key = symmetric::generate_key(bits)?;
        Ok(Self {
            id: new_id(),
            name: name.to_string(),
            key_material: encoding::encode(&key),
            key_size_bits: bits,
            purpose_tag: purpose_tag.to_string(),
            created_at: Utc::now(),
        })
    }

    pub fn key_size(&self) -> Result<KeySize> {
        KeySize::from_bits(self.key_size_bits)
    }

    /// Decode the raw key bytes.
    pub fn key_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        encoding::decode(&self.key_material).map(Zeroizing::new)
    }
}

impl KeyRecord for SymmetricKeyRecord {
    const COLLECTION: Collection = Collection::Symmetric;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        check_id(&self.id)?;
        let size = self.key_size()?;
        let key = self.key_bytes()?;
        if key.len() != size.byte_len() {
            return Err(KeyVaultError::Validation(format!(
                "key '{}' holds {} bytes but claims {} bits",
                self.id,
                key.len(),
                self.key_size_bits
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for SymmetricKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKeyRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("key_material", &"<redacted>")
            .field("key_size_bits", &self.key_size_bits)
            .field("purpose_tag", &self.purpose_tag)
            .field("created_at", &self.created_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Asymmetric keys
// ---------------------------------------------------------------------------

/// Whether a stored RSA record's private key can be used directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Private key is encrypted; a password is needed to use it.
    Locked,
    /// Private key is stored as plaintext.
    Plaintext,
    /// No private key at all (imported public key).
    PublicOnly,
}

/// A stored RSA key pair, or just a public key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsymmetricKeyRecord {
    pub id: String,
    pub name: String,
    /// Base64 SubjectPublicKeyInfo DER.
    pub public_key: String,
    /// Base64 PKCS#8 DER, or its AES ciphertext when `is_encrypted`.
    /// Empty for public-key-only records.
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    pub key_size_bits: u32,
    pub created_at: DateTime<Utc>,
}

impl AsymmetricKeyRecord {
    /// Store a generated pair with its private key in plaintext.
    pub fn from_key_pair(name: &str, pair: &KeyPair) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            public_key: pair.public_key.clone(),
            private_key: pair.private_key.to_string(),
            is_encrypted: false,
            salt: None,
            iv: None,
            key_size_bits: pair.bits,
            created_at: Utc::now(),
        }
    }

    /// Store a generated pair with its private key locked under `password`.
    pub fn locked(
        name: &str,
        pair: &KeyPair,
        password: &str,
        params: &Pbkdf2Params,
    ) -> Result<Self> {
        let encrypted = private_key::encrypt_private_key(&pair.private_key, password, params)?;
        Ok(Self {
            id: new_id(),
            name: name.to_string(),
            public_key: pair.public_key.clone(),
            private_key: encrypted.ciphertext,
            is_encrypted: true,
            salt: Some(encrypted.salt),
            iv: Some(encrypted.iv),
            key_size_bits: pair.bits,
            created_at: Utc::now(),
        })
    }

    /// A record holding only someone else's public key.
    ///
    /// Accepts either a PEM `PUBLIC KEY` block or a bare encoded key.
    pub fn public_only(name: &str, public_key: &str) -> Result<Self> {
        let encoded = if public_key.contains("-----BEGIN") {
            pem::extract_base64_from_pem(public_key, PemKind::PublicKey)?
        } else {
            public_key.chars().filter(|c| !c.is_whitespace()).collect()
        };

        if !asymmetric::is_valid_public_key(&encoded) {
            return Err(KeyVaultError::Validation(
                "not a valid RSA public key".into(),
            ));
        }
        let bits = asymmetric::public_key_bits(&encoded)?;

        Ok(Self {
            id: new_id(),
            name: name.to_string(),
            public_key: encoded,
            private_key: String::new(),
            is_encrypted: false,
            salt: None,
            iv: None,
            key_size_bits: bits,
            created_at: Utc::now(),
        })
    }

    pub fn lock_state(&self) -> LockState {
        if self.is_encrypted {
            LockState::Locked
        } else if self.private_key.is_empty() {
            LockState::PublicOnly
        } else {
            LockState::Plaintext
        }
    }

    /// The locked private key with its salt and IV, if this record is locked.
    pub fn encrypted_private_key(&self) -> Option<EncryptedPrivateKey> {
        if !self.is_encrypted {
            return None;
        }
        Some(EncryptedPrivateKey {
            ciphertext: self.private_key.clone(),
            salt: self.salt.clone()?,
            iv: self.iv.clone()?,
        })
    }

    /// Get the usable private key.
    ///
    /// Locked records are decrypted with `password`; plaintext records
    /// return a copy and ignore the password.  The result lives only as
    /// long as the caller keeps it.
    pub fn unlock(
        &self,
        password: Option<&str>,
        params: &Pbkdf2Params,
    ) -> Result<Zeroizing<String>> {
        match self.lock_state() {
            LockState::Plaintext => Ok(Zeroizing::new(self.private_key.clone())),
            LockState::PublicOnly => Err(KeyVaultError::Validation(format!(
                "key '{}' has no private key",
                self.id
            ))),
            LockState::Locked => {
                let encrypted = self.encrypted_private_key().ok_or_else(|| {
                    KeyVaultError::Validation(format!(
                        "key '{}' is missing its salt or IV",
                        self.id
                    ))
                })?;
                let password = password.ok_or(KeyVaultError::AuthenticationFailed)?;
                private_key::decrypt_private_key(&encrypted, password, params)
            }
        }
    }
}

impl KeyRecord for AsymmetricKeyRecord {
    const COLLECTION: Collection = Collection::Asymmetric;

    fn id(&self) -> &str {
        &self.id
    }

    /// `is_encrypted` must hold exactly when both salt and IV are present.
    fn validate(&self) -> Result<()> {
        check_id(&self.id)?;
        if self.public_key.trim().is_empty() {
            return Err(KeyVaultError::Validation(format!(
                "key '{}' has no public key",
                self.id
            )));
        }

        let has_params = self.salt.is_some() && self.iv.is_some();
        if self.is_encrypted && !has_params {
            return Err(KeyVaultError::Validation(format!(
                "key '{}' is marked encrypted but lacks salt or IV",
                self.id
            )));
        }
        if !self.is_encrypted && (self.salt.is_some() || self.iv.is_some()) {
            return Err(KeyVaultError::Validation(format!(
                "key '{}' carries salt/IV but is not marked encrypted",
                self.id
            )));
        }
        if self.is_encrypted && self.private_key.is_empty() {
            return Err(KeyVaultError::Validation(format!(
                "key '{}' is marked encrypted but has no ciphertext",
                self.id
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for AsymmetricKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let private = match self.lock_state() {
            LockState::Locked => "<encrypted>",
            LockState::Plaintext => "<redacted>",
            LockState::PublicOnly => "<none>",
        };
        f.debug_struct("AsymmetricKeyRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("public_key", &self.public_key)
            .field("private_key", &private)
            .field("is_encrypted", &self.is_encrypted)
            .field("key_size_bits", &self.key_size_bits)
            .field("created_at", &self.created_at)
            .finish()
    }
}
