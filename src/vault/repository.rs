//! CRUD over the stored key collections.
//!
//! `KeyRepository` owns the persisted record set.  Callers get copies
//! back from reads and hand whole records to `save`; nothing is edited in
//! place.  Every mutation is a read-modify-write of one document, so
//! writers serialize through a single lock.
//!
//! Reads are lenient: a document that cannot be read or parsed is logged
//! and treated as an empty collection.  Writes are strict and refuse to
//! replace a document they could not parse, so a damaged store is never
//! overwritten with a shorter one.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::bundle::{ExportBundle, ImportSummary};
use crate::errors::{KeyVaultError, Result};

use super::backend::StorageBackend;
use super::records::{AsymmetricKeyRecord, KeyRecord, SymmetricKeyRecord};

pub struct KeyRepository<B: StorageBackend> {
    backend: B,
    write_lock: Mutex<()>,
}

impl<B: StorageBackend> KeyRepository<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Every record of type `R`, in stored order.
    pub fn load_all<R: KeyRecord>(&self) -> Vec<R> {
        self.read_lenient()
    }

    /// Look up a single record by id.
    pub fn find<R: KeyRecord>(&self, id: &str) -> Option<R> {
        self.read_lenient::<R>().into_iter().find(|r| r.id() == id)
    }

    /// Symmetric keys carrying exactly `tag`.
    pub fn load_by_purpose_tag(&self, tag: &str) -> Vec<SymmetricKeyRecord> {
        self.read_lenient::<SymmetricKeyRecord>()
            .into_iter()
            .filter(|r| r.purpose_tag == tag)
            .collect()
    }

    /// Both collections, stamped with the current time.
    pub fn snapshot(&self) -> ExportBundle {
        ExportBundle::new(self.load_all(), self.load_all())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert `record`, or replace the stored record with the same id.
    pub fn save<R: KeyRecord>(&self, record: R) -> Result<()> {
        record.validate()?;

        let _guard = self.lock();
        let mut records: Vec<R> = self.read_strict()?;
        match records.iter_mut().find(|r| r.id() == record.id()) {
            Some(slot) => {
                log::debug!("replacing {} record", R::COLLECTION.document_name());
                *slot = record;
            }
            None => records.push(record),
        }
        self.write_all(&records)
    }

    /// Remove the record with `id`.  Unknown ids are `NotFound`.
    pub fn delete<R: KeyRecord>(&self, id: &str) -> Result<()> {
        let _guard = self.lock();
        let mut records: Vec<R> = self.read_strict()?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Err(KeyVaultError::NotFound(id.to_string()));
        }
        self.write_all(&records)
    }

    /// Add every record from `bundle` whose id is not stored yet.
    ///
    /// Existing records always win and are never overwritten, which
    /// makes importing the same bundle twice a no-op.  The whole bundle
    /// is validated before anything is written.
    pub fn merge_import(&self, bundle: &ExportBundle) -> Result<ImportSummary> {
        for record in &bundle.symmetric_keys {
            record.validate()?;
        }
        for record in &bundle.asymmetric_keys {
            record.validate()?;
        }

        let _guard = self.lock();
        let mut symmetric: Vec<SymmetricKeyRecord> = self.read_strict()?;
        let mut asymmetric: Vec<AsymmetricKeyRecord> = self.read_strict()?;

        let (symmetric_added, symmetric_skipped) =
            merge_new(&mut symmetric, &bundle.symmetric_keys);
        let (asymmetric_added, asymmetric_skipped) =
            merge_new(&mut asymmetric, &bundle.asymmetric_keys);

        if symmetric_added > 0 {
            self.write_all(&symmetric)?;
        }
        if asymmetric_added > 0 {
            self.write_all(&asymmetric)?;
        }

        let summary = ImportSummary {
            symmetric_added,
            symmetric_skipped,
            asymmetric_added,
            asymmetric_skipped,
        };
        log::info!(
            "import merged {} new record(s), skipped {}",
            summary.added(),
            summary.skipped()
        );
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_strict<R: KeyRecord>(&self) -> Result<Vec<R>> {
        let collection = R::COLLECTION;
        let Some(document) = self.backend.read(collection)? else {
            return Ok(Vec::new());
        };
        if document.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&document).map_err(|e| {
            KeyVaultError::SerializationError(format!("{}: {e}", collection.document_name()))
        })
    }

    fn read_lenient<R: KeyRecord>(&self) -> Vec<R> {
        match self.read_strict() {
            Ok(records) => records,
            Err(e) => {
                log::warn!(
                    "treating {} as empty: {e}",
                    R::COLLECTION.document_name()
                );
                Vec::new()
            }
        }
    }

    fn write_all<R: KeyRecord>(&self, records: &[R]) -> Result<()> {
        let document = serde_json::to_string_pretty(records)
            .map_err(|e| KeyVaultError::SerializationError(e.to_string()))?;
        self.backend.write(R::COLLECTION, &document)
    }
}

/// Append records from `incoming` whose ids are not in `existing`.
/// Duplicate ids inside `incoming` count once; later copies are skipped.
fn merge_new<R: KeyRecord>(existing: &mut Vec<R>, incoming: &[R]) -> (usize, usize) {
    let mut seen: HashSet<String> = existing.iter().map(|r| r.id().to_string()).collect();
    let mut added = 0;
    let mut skipped = 0;

    for record in incoming {
        if seen.insert(record.id().to_string()) {
            existing.push(record.clone());
            added += 1;
        } else {
            skipped += 1;
        }
    }
    (added, skipped)
}
