//! Owner-only file creation for anything that holds key material.
//!
//! On Unix the file is opened with mode 0o600 so it is never readable by
//! other users, not even between creation and a later `chmod`.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::errors::{KeyVaultError, Result};

/// Create `path` for writing with owner-only permissions.
///
/// An existing file at `path` is removed first; its permissions never
/// carry over to the new one.
pub fn create_owner_only(path: &Path) -> io::Result<File> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}

/// Write `contents` to `path` through `create_owner_only`.
pub fn write_owner_only(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = create_owner_only(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// `dir/report.pdf` -> `dir/.report.pdf.tmp`
pub fn sibling_temp_path(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        KeyVaultError::Validation(format!("{} is not a file path", path.display()))
    })?;
    let mut tmp = OsString::from(".");
    tmp.push(name);
    tmp.push(".tmp");
    Ok(path.with_file_name(tmp))
}

/// Fail with `Validation` when `destination` already exists and is the
/// same file as `source`, however either path is spelled.
pub fn ensure_distinct(source: &Path, destination: &Path) -> Result<()> {
    if !destination.exists() {
        return Ok(());
    }
    if fs::canonicalize(source)? == fs::canonicalize(destination)? {
        return Err(KeyVaultError::Validation(format!(
            "output {} is the input file",
            destination.display()
        )));
    }
    Ok(())
}
