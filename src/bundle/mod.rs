//! Portable export bundles.
//!
//! An `ExportBundle` holds every stored key.  `export_keys` snapshots a
//! repository into bundle bytes; `import_keys` reads them back and
//! merges only the records whose ids are new.

pub mod codec;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::kdf::Pbkdf2Params;
use crate::errors::Result;
use crate::vault::{AsymmetricKeyRecord, KeyRepository, StorageBackend, SymmetricKeyRecord};

/// Every key in a store at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub format_version: String,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub symmetric_keys: Vec<SymmetricKeyRecord>,
    #[serde(default)]
    pub asymmetric_keys: Vec<AsymmetricKeyRecord>,
}

impl ExportBundle {
    pub fn new(
        symmetric_keys: Vec<SymmetricKeyRecord>,
        asymmetric_keys: Vec<AsymmetricKeyRecord>,
    ) -> Self {
        Self {
            format_version: codec::FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            symmetric_keys,
            asymmetric_keys,
        }
    }

    pub fn len(&self) -> usize {
        self.symmetric_keys.len() + self.asymmetric_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a merge-import did, per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub symmetric_added: usize,
    pub symmetric_skipped: usize,
    pub asymmetric_added: usize,
    pub asymmetric_skipped: usize,
}

impl ImportSummary {
    pub fn added(&self) -> usize {
        self.symmetric_added + self.asymmetric_added
    }

    /// Records left out because their id was already stored.
    pub fn skipped(&self) -> usize {
        self.symmetric_skipped + self.asymmetric_skipped
    }
}

/// Serialize everything in `repo`, encrypted when `password` is set.
pub fn export_keys<B: StorageBackend>(
    repo: &KeyRepository<B>,
    password: Option<&str>,
    params: &Pbkdf2Params,
) -> Result<Vec<u8>> {
    let bundle = repo.snapshot();
    log::debug!(
        "exporting {} symmetric and {} asymmetric key(s)",
        bundle.symmetric_keys.len(),
        bundle.asymmetric_keys.len()
    );
    codec::serialize(&bundle, password, params)
}

/// Decode `bytes` and merge the bundle into `repo`.
///
/// Nothing is written if decoding or validation fails.
pub fn import_keys<B: StorageBackend>(
    repo: &KeyRepository<B>,
    bytes: &[u8],
    password: Option<&str>,
    params: &Pbkdf2Params,
) -> Result<ImportSummary> {
    let bundle = codec::deserialize(bytes, password, params)?;
    repo.merge_import(&bundle)
}

/// Default file name for an export written at `now`.
///
/// Encrypted bundles get `.ejson` so they are not mistaken for JSON.
pub fn suggested_file_name(encrypted: bool, now: DateTime<Utc>) -> String {
    let extension = if encrypted { "ejson" } else { "json" };
    format!("keyvault_keys_{}.{extension}", now.timestamp_millis())
}
