//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{KeyVaultError, Result};
use crate::vault::{FileBackend, KeyRepository};

/// Minimum length for passwords that protect new material.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable checked before prompting for a password.
pub const PASSWORD_ENV: &str = "KEYVAULT_PASSWORD";

/// KeyVault CLI: local store for AES and RSA keys.
#[derive(Parser)]
#[command(
    name = "keyvault",
    about = "Local vault for AES and RSA keys",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Key store directory (default: store_dir from .keyvault.toml, else .keyvault)
    #[arg(long, global = true)]
    pub store_dir: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Manage AES keys and encrypt text with them
    Aes {
        #[command(subcommand)]
        action: AesAction,
    },

    /// Manage RSA key pairs and encrypt text with them
    Rsa {
        #[command(subcommand)]
        action: RsaAction,
    },

    /// Delete a stored key by id
    Delete {
        /// Key id (see `aes list` / `rsa list`)
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Export all keys into a single bundle file
    Export {
        /// Output file (default: keyvault_keys_<timestamp>.json or .ejson)
        #[arg(short, long)]
        output: Option<String>,
        /// Protect the bundle with a password
        #[arg(long)]
        encrypt: bool,
    },

    /// Import keys from a bundle file (existing ids are kept)
    Import {
        /// Path to the bundle file
        file: String,
    },

    /// Encrypt a file with a password
    EncryptFile {
        /// File to encrypt
        input: String,
        /// Output path (default: <input>.enc)
        #[arg(short, long)]
        output: Option<String>,
        /// AES key size: 128, 192 or 256
        #[arg(long)]
        bits: Option<u32>,
    },

    /// Decrypt a file produced by `encrypt-file`
    DecryptFile {
        /// File to decrypt
        input: String,
        /// Output path (default: <input> without .enc)
        #[arg(short, long)]
        output: Option<String>,
        /// AES key size used for encryption
        #[arg(long)]
        bits: Option<u32>,
    },
}

/// `aes` subcommands.
#[derive(clap::Subcommand)]
pub enum AesAction {
    /// Generate and store a new AES key
    Generate {
        /// Display name
        name: String,
        /// Key size: 128, 192 or 256
        #[arg(long)]
        bits: Option<u32>,
        /// Purpose tag (e.g. text, file)
        #[arg(long, default_value = "text")]
        purpose: String,
    },

    /// List stored AES keys
    List {
        /// Only show keys with this purpose tag
        #[arg(long)]
        purpose: Option<String>,
    },

    /// Encrypt text with a stored key, or with a password if no key is given
    Encrypt {
        /// Text to encrypt
        text: String,
        /// Id of a stored AES key
        #[arg(long)]
        key: Option<String>,
        /// Key size when encrypting with a password
        #[arg(long)]
        bits: Option<u32>,
    },

    /// Decrypt text produced by `aes encrypt`
    Decrypt {
        /// Base64 ciphertext
        ciphertext: String,
        /// Id of a stored AES key
        #[arg(long)]
        key: Option<String>,
        /// Key size when decrypting with a password
        #[arg(long)]
        bits: Option<u32>,
    },
}

/// `rsa` subcommands.
#[derive(clap::Subcommand)]
pub enum RsaAction {
    /// Generate and store a new RSA key pair
    Generate {
        /// Display name
        name: String,
        /// Modulus size in bits
        #[arg(long)]
        bits: Option<u32>,
        /// Encrypt the private key with a password
        #[arg(long)]
        protect: bool,
    },

    /// List stored RSA keys
    List,

    /// Encrypt short text with a stored public key
    Encrypt {
        /// Key id
        id: String,
        /// Text to encrypt
        text: String,
    },

    /// Decrypt text with a stored private key
    Decrypt {
        /// Key id
        id: String,
        /// Base64 ciphertext
        ciphertext: String,
    },

    /// Store someone else's public key from a PEM or base64 file
    ImportPublic {
        /// Display name
        name: String,
        /// File holding the public key
        file: String,
    },

    /// Print a stored key as PEM
    Pem {
        /// Key id
        id: String,
        /// Print the private key instead of the public key
        #[arg(long)]
        private: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load settings for the current directory and apply CLI overrides.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    let mut settings = Settings::load(&cwd)?;
    if let Some(dir) = &cli.store_dir {
        settings.store_dir = dir.clone();
    }
    Ok(settings)
}

/// Full path of the key store directory.
///
/// Example: `<cwd>/.keyvault`
pub fn store_path(settings: &Settings) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(settings.store_path(&cwd))
}

/// Open the file-backed repository described by `settings`.
pub fn open_repository(settings: &Settings) -> Result<KeyRepository<FileBackend>> {
    let dir = store_path(settings)?;
    log::debug!("using key store at {}", dir.display());
    Ok(KeyRepository::new(FileBackend::new(dir)))
}

/// Get a password, trying in order:
/// 1. `KEYVAULT_PASSWORD` env var (scripts, CI)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| KeyVaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation.
///
/// Also respects `KEYVAULT_PASSWORD` for scripted usage.
/// Enforces a minimum password length.
pub fn prompt_new_password(prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        if pw.len() < MIN_PASSWORD_LEN {
            return Err(KeyVaultError::CommandFailed(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt(prompt)
            .with_confirmation("Confirm password", "Passwords do not match, try again")
            .interact()
            .map_err(|e| KeyVaultError::CommandFailed(format!("password prompt: {e}")))?;

        if password.len() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

fn password_from_env() -> Option<Zeroizing<String>> {
    match std::env::var(PASSWORD_ENV) {
        Ok(pw) if !pw.is_empty() => Some(Zeroizing::new(pw)),
        _ => None,
    }
}
