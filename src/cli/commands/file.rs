//! `keyvault encrypt-file` / `decrypt-file` — password-based file encryption.

use std::path::{Path, PathBuf};

use crate::cli::output::{self, ProgressLine};
use crate::cli::{load_settings, prompt_new_password, prompt_password, Cli};
use crate::crypto::{secure_file, stream};
use crate::crypto::KeySize;
use crate::errors::{KeyVaultError, Result};

/// Extension appended to encrypted files.
const ENCRYPTED_EXTENSION: &str = "enc";

/// Execute `encrypt-file`.
pub fn encrypt(cli: &Cli, input: &str, output_path: Option<&str>, bits: Option<u32>) -> Result<()> {
    let settings = load_settings(cli)?;
    let key_size = KeySize::from_bits(bits.unwrap_or(settings.default_aes_bits))?;

    let source = existing_file(input)?;
    let dest = match output_path {
        Some(p) => PathBuf::from(p),
        None => encrypted_name(source),
    };
    refuse_same_path(source, &dest)?;

    let password = prompt_new_password("File password")?;

    let mut progress = ProgressLine::new("Encrypting");
    let result = stream::encrypt_file(
        source,
        &dest,
        &password,
        key_size,
        &settings.pbkdf2_params(),
        &mut progress,
    );
    progress.finish();
    let written = result?;

    output::success(&format!(
        "Encrypted {} -> {} ({written} bytes, AES-{})",
        source.display(),
        dest.display(),
        key_size.bits()
    ));
    Ok(())
}

/// Execute `decrypt-file`.
pub fn decrypt(cli: &Cli, input: &str, output_path: Option<&str>, bits: Option<u32>) -> Result<()> {
    let settings = load_settings(cli)?;
    let key_size = KeySize::from_bits(bits.unwrap_or(settings.default_aes_bits))?;

    let source = existing_file(input)?;
    let dest = match output_path {
        Some(p) => PathBuf::from(p),
        None => decrypted_name(source)?,
    };
    refuse_same_path(source, &dest)?;

    let password = prompt_password("File password")?;

    let mut progress = ProgressLine::new("Decrypting");
    let result = stream::decrypt_file(
        source,
        &dest,
        &password,
        key_size,
        &settings.pbkdf2_params(),
        &mut progress,
    );
    progress.finish();
    let written = result?;

    output::success(&format!(
        "Decrypted {} -> {} ({written} bytes)",
        source.display(),
        dest.display()
    ));
    Ok(())
}

fn existing_file(input: &str) -> Result<&Path> {
    let path = Path::new(input);
    if !path.is_file() {
        return Err(KeyVaultError::CommandFailed(format!(
            "input file not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

fn refuse_same_path(source: &Path, dest: &Path) -> Result<()> {
    secure_file::ensure_distinct(source, dest).map_err(|e| match e {
        KeyVaultError::Validation(_) => {
            KeyVaultError::CommandFailed("output path must differ from the input file".into())
        }
        other => other,
    })
}

/// `report.pdf` -> `report.pdf.enc`
fn encrypted_name(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    PathBuf::from(name)
}

/// `report.pdf.enc` -> `report.pdf`
fn decrypted_name(source: &Path) -> Result<PathBuf> {
    if source.extension().is_some_and(|ext| ext == ENCRYPTED_EXTENSION) {
        return Ok(source.with_extension(""));
    }
    Err(KeyVaultError::CommandFailed(format!(
        "{} has no .{ENCRYPTED_EXTENSION} extension; pass --output",
        source.display()
    )))
}
