//! `keyvault import` — merge keys from a bundle file.
//!
//! Records whose id is already stored are left untouched, so importing
//! the same file twice changes nothing.

use std::fs;
use std::path::Path;

use crate::bundle::{self, codec};
use crate::cli::output;
use crate::cli::{load_settings, open_repository, prompt_password, Cli};
use crate::errors::{KeyVaultError, Result};

/// Execute the `import` command.
pub fn execute(cli: &Cli, file_path: &str) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;
    let source = Path::new(file_path);

    if !source.exists() {
        return Err(KeyVaultError::CommandFailed(format!(
            "import file not found: {}",
            source.display()
        )));
    }
    let bytes = fs::read(source)?;

    // Only encrypted bundles need a password.
    let password = if codec::is_encrypted(&bytes) {
        Some(prompt_password("Bundle password")?)
    } else {
        None
    };

    let summary = bundle::import_keys(
        &repo,
        &bytes,
        password.as_deref().map(String::as_str),
        &settings.pbkdf2_params(),
    )?;

    if summary.added() == 0 {
        output::info("No new keys in this bundle.");
    } else {
        output::success(&format!(
            "Imported {} AES and {} RSA key(s) from {}",
            summary.symmetric_added,
            summary.asymmetric_added,
            source.display()
        ));
    }
    if summary.skipped() > 0 {
        output::tip(&format!(
            "{} key(s) skipped because their id is already stored",
            summary.skipped()
        ));
    }
    Ok(())
}
