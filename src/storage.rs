//! Collaborator contracts for photo blobs and profile records.
//!
//! The pipeline only ever talks to the [`ObjectStore`] and [`RecordStore`]
//! traits. File-system backed implementations serve the CLI; in-memory ones
//! record every call and can be switched into failure for tests and dry runs.

mod local;
mod memory;
#[cfg(test)]
mod tests;

pub use local::{FsObjectStore, FsRecordStore};
pub use memory::{MemoryObjectStore, MemoryRecordStore, PutCall, UpsertCall};

use crate::error::StorageError;
use crate::identity::Identity;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Partial document written by an upsert
pub type Record = Map<String, Value>;

/// Opaque blob store with URL-returning upload
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`; durable once this returns Ok
    async fn put(
        &self,
        key: &str,
        data: Arc<Vec<u8>>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Public locator for a previously stored key
    async fn public_url(&self, key: &str) -> Result<String, StorageError>;
}

/// Upsert-by-key document store with merge semantics
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Merge `partial` into the record; fields absent from `partial` are left untouched
    async fn upsert(
        &self,
        collection: &str,
        key: &Identity,
        partial: Record,
    ) -> Result<(), StorageError>;

    async fn fetch(&self, collection: &str, key: &Identity)
        -> Result<Option<Record>, StorageError>;
}

/// Field every record store stamps with the time of the last write
const UPDATED_AT_FIELD: &str = "updated_at";

/// Shallow merge used by every record store implementation; nulls never
/// overwrite, and the write time is stamped by the store, not the caller
pub(crate) fn merge_record(existing: &mut Record, partial: Record) {
    for (field, value) in partial {
        if !value.is_null() {
            existing.insert(field, value);
        }
    }
    existing.insert(
        UPDATED_AT_FIELD.to_string(),
        Value::from(Utc::now().to_rfc3339()),
    );
}
