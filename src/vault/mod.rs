//! Vault module — persisted key records.
//!
//! This module provides:
//! - `SymmetricKeyRecord` and `AsymmetricKeyRecord` (`records`)
//! - The storage port and its file/memory implementations (`backend`)
//! - `KeyRepository` for upsert, lookup, delete and merge-import (`repository`)

pub mod backend;
pub mod records;
pub mod repository;

// Re-export the most commonly used items.
pub use backend::{Collection, FileBackend, MemoryBackend, StorageBackend};
pub use records::{AsymmetricKeyRecord, KeyRecord, LockState, SymmetricKeyRecord};
pub use repository::KeyRepository;
