//! The storage backend contract: a named collection of byte-blob stores with
//! atomic multi-store writes. Everything above this layer -- schema layout,
//! encryption, batching -- is backend-agnostic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use doc_core::StoreResult;

/// A single stored row as it crosses the backend boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: String,
    pub payload: Vec<u8>,
}

/// A set of writes to apply atomically across one or more named stores.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    stores: BTreeMap<String, Vec<StoredRecord>>,
}

impl WriteBatch {
    pub fn insert(&mut self, store: impl Into<String>, id: impl Into<String>, payload: Vec<u8>) {
        self.stores
            .entry(store.into())
            .or_default()
            .push(StoredRecord { id: id.into(), payload });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.values().all(Vec::is_empty)
    }

    pub fn stores(&self) -> impl Iterator<Item = (&str, &[StoredRecord])> {
        self.stores.iter().map(|(name, records)| (name.as_str(), records.as_slice()))
    }
}

/// Low-level, backend-agnostic persistence contract (analogous to a
/// key-value store with named tables). A schema strategy decides what store
/// names mean; this trait only has to make writes atomic and reads honest.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Opens or creates whatever the backend needs on disk/in memory. Must be
    /// idempotent -- called again after `clear_all` during `deleteDatabase`.
    async fn initialize(&self) -> StoreResult<()>;

    /// Applies every store's writes in one atomic transaction.
    async fn write_records(&self, batch: WriteBatch) -> StoreResult<()>;

    async fn read_record(&self, store: &str, id: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Optional bulk-read capability. `Ok(None)` means "not supported, fall
    /// back to per-id reads" -- see [`super::bulk::read_bulk_or_fallback`].
    async fn read_records_bulk(
        &self,
        store: &str,
        ids: &[String],
    ) -> StoreResult<Option<Vec<StoredRecord>>>;

    async fn read_all_records(&self, store: &str) -> StoreResult<Vec<StoredRecord>>;

    async fn delete_record(&self, store: &str, id: &str) -> StoreResult<()>;

    async fn clear_store(&self, store: &str) -> StoreResult<()>;

    /// Drops every store. Used by `deleteDatabase`; the schema strategy is
    /// expected to re-seed an empty inventory immediately afterwards.
    async fn clear_all(&self) -> StoreResult<()>;

    fn is_ready(&self) -> bool;

    async fn close(&self) -> StoreResult<()>;
}
