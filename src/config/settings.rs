use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::asymmetric::{MAX_KEY_BITS, MIN_KEY_BITS};
use crate::crypto::kdf::Pbkdf2Params;
use crate::crypto::symmetric::KeySize;
use crate::errors::{KeyVaultError, Result};

/// Lowest PBKDF2 iteration count a config file may ask for.
pub const MIN_PBKDF2_ITERATIONS: u32 = 1_000;

/// Project-level configuration, loaded from `.keyvault.toml`.
///
/// Every field has a default so the tool works without a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to project root) holding the key documents.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// PBKDF2 work factor for private keys, exports and file encryption.
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    /// AES key size used when none is given on the command line.
    #[serde(default = "default_aes_bits")]
    pub default_aes_bits: u32,

    /// RSA modulus size used when none is given on the command line.
    #[serde(default = "default_rsa_bits")]
    pub default_rsa_bits: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_store_dir() -> String {
    ".keyvault".to_string()
}

fn default_pbkdf2_iterations() -> u32 {
    crate::crypto::kdf::DEFAULT_ITERATIONS
}

fn default_aes_bits() -> u32 {
    256
}

fn default_rsa_bits() -> u32 {
    2048
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            default_aes_bits: default_aes_bits(),
            default_rsa_bits: default_rsa_bits(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".keyvault.toml";

    /// Load settings from `<project_dir>/.keyvault.toml`.
    ///
    /// A missing file yields defaults.  A file that cannot be parsed, or
    /// whose values are out of range, is an error.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            KeyVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;
        settings.validate()?;

        log::debug!("loaded settings from {}", config_path.display());
        Ok(settings)
    }

    /// Reject values the crypto layer would refuse later.
    pub fn validate(&self) -> Result<()> {
        if self.store_dir.trim().is_empty() {
            return Err(KeyVaultError::ConfigError("store_dir cannot be empty".into()));
        }
        if self.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(KeyVaultError::ConfigError(format!(
                "pbkdf2_iterations must be at least {MIN_PBKDF2_ITERATIONS} (got {})",
                self.pbkdf2_iterations
            )));
        }
        if KeySize::from_bits(self.default_aes_bits).is_err() {
            return Err(KeyVaultError::ConfigError(format!(
                "default_aes_bits must be 128, 192 or 256 (got {})",
                self.default_aes_bits
            )));
        }
        let rsa = self.default_rsa_bits;
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&rsa) || rsa % 8 != 0 {
            return Err(KeyVaultError::ConfigError(format!(
                "default_rsa_bits must be a multiple of 8 between {MIN_KEY_BITS} and {MAX_KEY_BITS} (got {rsa})"
            )));
        }
        Ok(())
    }

    /// Directory of the file-backed store.
    ///
    /// Example: `project_dir/.keyvault`
    pub fn store_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.store_dir)
    }

    /// Convert the KDF settings into crypto-layer params.
    pub fn pbkdf2_params(&self) -> Pbkdf2Params {
        Pbkdf2Params {
            iterations: self.pbkdf2_iterations,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
