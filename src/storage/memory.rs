use super::{merge_record, ObjectStore, Record, RecordStore};
use crate::error::StorageError;
use crate::identity::Identity;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutCall {
    pub key: String,
    pub byte_len: usize,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertCall {
    pub collection: String,
    pub key: String,
    pub partial: Record,
}

/// In-memory object store that records every put
pub struct MemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<String, Arc<Vec<u8>>>>,
    puts: Mutex<Vec<PutCall>>,
    fail_puts: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            puts: Mutex::new(Vec::new()),
            fail_puts: AtomicBool::new(false),
        }
    }

    /// Make every following put fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.fail_puts.store(failing, Ordering::SeqCst);
    }

    pub fn puts(&self) -> Vec<PutCall> {
        self.puts.lock().clone()
    }

    pub fn object(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        self.objects.lock().get(key).cloned()
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Arc<Vec<u8>>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.puts.lock().push(PutCall {
            key: key.to_string(),
            byte_len: data.len(),
            content_type: content_type.to_string(),
        });

        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                details: "object store rejected the upload".to_string(),
            });
        }

        debug!("Memory store put {} ({} bytes)", key, data.len());
        self.objects.lock().insert(key.to_string(), data);
        Ok(())
    }

    async fn public_url(&self, key: &str) -> Result<String, StorageError> {
        if self.objects.lock().contains_key(key) {
            Ok(format!("{}/{}", self.base_url, key))
        } else {
            Err(StorageError::NotFound {
                key: key.to_string(),
            })
        }
    }
}

/// In-memory record store that records every upsert
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<(String, String), Record>>,
    upserts: Mutex<Vec<UpsertCall>>,
    fail_upserts: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_upserts.store(failing, Ordering::SeqCst);
    }

    pub fn upserts(&self) -> Vec<UpsertCall> {
        self.upserts.lock().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert(
        &self,
        collection: &str,
        key: &Identity,
        partial: Record,
    ) -> Result<(), StorageError> {
        self.upserts.lock().push(UpsertCall {
            collection: collection.to_string(),
            key: key.to_string(),
            partial: partial.clone(),
        });

        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                details: "record store rejected the write".to_string(),
            });
        }

        let mut records = self.records.lock();
        let record = records
            .entry((collection.to_string(), key.to_string()))
            .or_default();
        merge_record(record, partial);
        Ok(())
    }

    async fn fetch(
        &self,
        collection: &str,
        key: &Identity,
    ) -> Result<Option<Record>, StorageError> {
        Ok(self
            .records
            .lock()
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }
}
