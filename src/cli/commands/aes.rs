//! `keyvault aes ...` — AES key management and text encryption.

use crate::cli::output;
use crate::cli::{load_settings, open_repository, prompt_password, Cli};
use crate::config::Settings;
use crate::crypto::symmetric::{self, KeySize};
use crate::errors::{KeyVaultError, Result};
use crate::vault::{FileBackend, KeyRepository, SymmetricKeyRecord};

/// Execute `aes generate`.
pub fn generate(cli: &Cli, name: &str, bits: Option<u32>, purpose: &str) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;

    let bits = bits.unwrap_or(settings.default_aes_bits);
    let record = SymmetricKeyRecord::generate(name, bits, purpose)?;
    let id = record.id.clone();
    repo.save(record)?;

    output::success(&format!("Generated {bits}-bit AES key '{name}'"));
    output::tip(&format!("Key id: {id}"));
    Ok(())
}

/// Execute `aes list`.
pub fn list(cli: &Cli, purpose: Option<&str>) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;

    let keys = match purpose {
        Some(tag) => repo.load_by_purpose_tag(tag),
        None => repo.load_all::<SymmetricKeyRecord>(),
    };

    output::info(&format!("{} AES key(s)", keys.len()));
    output::print_symmetric_table(&keys);
    Ok(())
}

/// Execute `aes encrypt`. Prints the base64 ciphertext to stdout.
pub fn encrypt(cli: &Cli, text: &str, key_id: Option<&str>, bits: Option<u32>) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;
    let params = settings.pbkdf2_params();

    let ciphertext = match key_id {
        Some(id) => {
            let record = find_key(&repo, id)?;
            symmetric::encrypt_text(text, &record.key_material, record.key_size()?, &params)?
        }
        None => {
            let key_size = password_key_size(&settings, bits)?;
            let password = prompt_password("Encryption password")?;
            symmetric::encrypt_text(text, &password, key_size, &params)?
        }
    };

    println!("{ciphertext}");
    Ok(())
}

/// Execute `aes decrypt`. Prints the plaintext to stdout.
pub fn decrypt(cli: &Cli, ciphertext: &str, key_id: Option<&str>, bits: Option<u32>) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;
    let params = settings.pbkdf2_params();

    let plaintext = match key_id {
        Some(id) => {
            let record = find_key(&repo, id)?;
            symmetric::decrypt_text(ciphertext, &record.key_material, record.key_size()?, &params)?
        }
        None => {
            let key_size = password_key_size(&settings, bits)?;
            let password = prompt_password("Decryption password")?;
            symmetric::decrypt_text(ciphertext, &password, key_size, &params)
                .map_err(|e| match e {
                    KeyVaultError::DecryptionFailed => KeyVaultError::AuthenticationFailed,
                    other => other,
                })?
        }
    };

    println!("{plaintext}");
    Ok(())
}

fn find_key(repo: &KeyRepository<FileBackend>, id: &str) -> Result<SymmetricKeyRecord> {
    repo.find::<SymmetricKeyRecord>(id)
        .ok_or_else(|| KeyVaultError::NotFound(id.to_string()))
}

fn password_key_size(settings: &Settings, bits: Option<u32>) -> Result<KeySize> {
    KeySize::from_bits(bits.unwrap_or(settings.default_aes_bits))
}
