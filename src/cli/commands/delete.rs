//! `keyvault delete` — remove a stored AES or RSA key.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{load_settings, open_repository, Cli};
use crate::errors::{KeyVaultError, Result};
use crate::vault::{AsymmetricKeyRecord, SymmetricKeyRecord};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;

    // Work out which collection the id lives in.
    let label = if let Some(record) = repo.find::<SymmetricKeyRecord>(id) {
        format!("AES key '{}'", record.name)
    } else if let Some(record) = repo.find::<AsymmetricKeyRecord>(id) {
        format!("RSA key '{}'", record.name)
    } else {
        return Err(KeyVaultError::NotFound(id.to_string()));
    };

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {label}?"))
            .default(false)
            .interact()
            .map_err(|e| KeyVaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    match repo.delete::<SymmetricKeyRecord>(id) {
        Err(KeyVaultError::NotFound(_)) => repo.delete::<AsymmetricKeyRecord>(id)?,
        other => other?,
    }

    output::success(&format!("Deleted {label}"));
    Ok(())
}
