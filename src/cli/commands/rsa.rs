//! `keyvault rsa ...` — RSA key pairs, public-key import and PEM output.

use std::fs;
use std::path::Path;

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{load_settings, open_repository, prompt_new_password, prompt_password, Cli};
use crate::crypto::asymmetric;
use crate::crypto::pem;
use crate::crypto::Pbkdf2Params;
use crate::errors::{KeyVaultError, Result};
use crate::vault::{AsymmetricKeyRecord, FileBackend, KeyRepository, LockState};

/// Execute `rsa generate`.
///
/// Generation runs on a worker thread; the record is only saved once
/// the job has finished successfully.
pub fn generate(cli: &Cli, name: &str, bits: Option<u32>, protect: bool) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;
    let bits = bits.unwrap_or(settings.default_rsa_bits);

    let password = if protect {
        Some(prompt_new_password("Private key password")?)
    } else {
        None
    };

    let job = asymmetric::spawn_key_pair(bits)?;
    output::info(&format!("Generating {bits}-bit RSA key pair..."));
    let pair = job.wait()?;

    let record = match &password {
        Some(pw) => AsymmetricKeyRecord::locked(name, &pair, pw, &settings.pbkdf2_params())?,
        None => AsymmetricKeyRecord::from_key_pair(name, &pair),
    };
    let id = record.id.clone();
    repo.save(record)?;

    output::success(&format!("Generated {bits}-bit RSA key pair '{name}'"));
    if password.is_none() {
        output::warning("The private key is stored unencrypted. Use --protect to add a password.");
    }
    output::tip(&format!("Key id: {id}"));
    Ok(())
}

/// Execute `rsa list`.
pub fn list(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;

    let keys = repo.load_all::<AsymmetricKeyRecord>();
    output::info(&format!("{} RSA key(s)", keys.len()));
    output::print_asymmetric_table(&keys);
    Ok(())
}

/// Execute `rsa encrypt`. Prints the base64 ciphertext to stdout.
pub fn encrypt(cli: &Cli, id: &str, text: &str) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;
    let record = find_key(&repo, id)?;

    let ciphertext = asymmetric::encrypt(text, &record.public_key)?;
    println!("{ciphertext}");
    Ok(())
}

/// Execute `rsa decrypt`. Prints the plaintext to stdout.
pub fn decrypt(cli: &Cli, id: &str, ciphertext: &str) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;
    let record = find_key(&repo, id)?;

    let private_key = unlock(&record, &settings.pbkdf2_params())?;
    let plaintext = asymmetric::decrypt(ciphertext, &private_key)?;
    println!("{plaintext}");
    Ok(())
}

/// Execute `rsa import-public`.
pub fn import_public(cli: &Cli, name: &str, file: &str) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;

    let source = Path::new(file);
    if !source.exists() {
        return Err(KeyVaultError::CommandFailed(format!(
            "public key file not found: {}",
            source.display()
        )));
    }
    let text = fs::read_to_string(source)?;

    let record = AsymmetricKeyRecord::public_only(name, &text)?;
    let (id, bits) = (record.id.clone(), record.key_size_bits);
    repo.save(record)?;

    output::success(&format!("Imported {bits}-bit public key '{name}'"));
    output::tip(&format!("Key id: {id}"));
    Ok(())
}

/// Execute `rsa pem`. Prints the PEM block to stdout.
pub fn pem(cli: &Cli, id: &str, private: bool) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;
    let record = find_key(&repo, id)?;

    if private {
        let private_key = unlock(&record, &settings.pbkdf2_params())?;
        println!("{}", pem::private_key_to_pem(&private_key));
    } else {
        println!("{}", pem::public_key_to_pem(&record.public_key));
    }
    Ok(())
}

fn find_key(repo: &KeyRepository<FileBackend>, id: &str) -> Result<AsymmetricKeyRecord> {
    repo.find::<AsymmetricKeyRecord>(id)
        .ok_or_else(|| KeyVaultError::NotFound(id.to_string()))
}

/// Get the private key, prompting for a password only when it is locked.
fn unlock(record: &AsymmetricKeyRecord, params: &Pbkdf2Params) -> Result<Zeroizing<String>> {
    match record.lock_state() {
        LockState::Locked => {
            let password = prompt_password("Private key password")?;
            record.unlock(Some(password.as_str()), params)
        }
        _ => record.unlock(None, params),
    }
}
