//! `keyvault export` — write every stored key into one bundle file.
//!
//! Without `--encrypt` the bundle is plain JSON and contains private
//! keys exactly as stored.  With `--encrypt` it is wrapped in a
//! password envelope.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::bundle;
use crate::cli::output;
use crate::cli::{load_settings, open_repository, prompt_new_password, store_path, Cli};
use crate::crypto::secure_file;
use crate::errors::{KeyVaultError, Result};

/// Execute the `export` command.
pub fn execute(cli: &Cli, output_path: Option<&str>, encrypt: bool) -> Result<()> {
    let settings = load_settings(cli)?;
    let repo = open_repository(&settings)?;

    let dest = match output_path {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(bundle::suggested_file_name(encrypt, Utc::now())),
    };

    // Safety: refuse to write over the store's own documents.
    let store = store_path(&settings)?;
    if dest.parent().is_some_and(|p| same_dir(p, &store)) {
        return Err(KeyVaultError::CommandFailed(
            "refusing to export into the key store directory".into(),
        ));
    }

    let password = if encrypt {
        Some(prompt_new_password("Export password")?)
    } else {
        None
    };

    let snapshot_len = repo.snapshot().len();
    let bytes = bundle::export_keys(
        &repo,
        password.as_deref().map(String::as_str),
        &settings.pbkdf2_params(),
    )?;

    secure_file::write_owner_only(&dest, &bytes).map_err(|e| {
        KeyVaultError::CommandFailed(format!("failed to write export file: {e}"))
    })?;

    output::success(&format!(
        "Exported {snapshot_len} key(s) to {}",
        dest.display()
    ));
    if !encrypt {
        output::warning("This file is not encrypted. Use --encrypt to protect it with a password.");
    }
    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
