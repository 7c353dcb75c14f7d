//! Where key collections are persisted.
//!
//! A backend stores two opaque text documents, one per collection.  It
//! knows nothing about their contents; parsing and validation live in
//! the repository.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::crypto::secure_file;
use crate::errors::Result;

/// The two named collections a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Symmetric,
    Asymmetric,
}

impl Collection {
    /// File name of the collection's document inside the store directory.
    pub fn document_name(self) -> &'static str {
        match self {
            Self::Symmetric => "symmetric_keys.json",
            Self::Asymmetric => "asymmetric_keys.json",
        }
    }
}

/// Persistence for the serialized collections.
pub trait StorageBackend: Send + Sync {
    /// Return the stored document, or `None` if nothing was saved yet.
    fn read(&self, collection: Collection) -> Result<Option<String>>;

    /// Replace the stored document as a whole.
    fn write(&self, collection: Collection, document: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// Stores each collection as a JSON file in one directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.document_name())
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, collection: Collection) -> Result<Option<String>> {
        let path = self.document_path(collection);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    /// Writes to a temp file in the same directory and renames it over
    /// the target, so readers never see a half-written document.
    fn write(&self, collection: Collection, document: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.document_path(collection);
        let tmp_path = self
            .dir
            .join(format!(".{}.tmp", collection.document_name()));

        // Documents hold key material; owner-only from the first byte.
        secure_file::write_owner_only(&tmp_path, document.as_bytes())?;

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Keeps documents in memory. Used by tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<Collection, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with a raw document, valid or not.
    pub fn with_document(self, collection: Collection, document: &str) -> Self {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection, document.to_string());
        self
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, collection: Collection) -> Result<Option<String>> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(&collection).cloned())
    }

    fn write(&self, collection: Collection, document: &str) -> Result<()> {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.insert(collection, document.to_string());
        Ok(())
    }
}
