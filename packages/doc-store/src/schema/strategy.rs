//! Schema strategy contract: how documents and the inventory are laid out
//! across a storage backend's named stores.

use async_trait::async_trait;
use doc_core::{DocumentRecord, Inventory, StoreResult};

use crate::codec::RecordCodec;
use crate::storage::backend::StorageBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryKind {
    Json,
    Table,
}

#[async_trait]
pub trait SchemaStrategy: Send + Sync {
    async fn initialize_schema(&self, backend: &dyn StorageBackend) -> StoreResult<()>;

    async fn read_inventory(&self, backend: &dyn StorageBackend) -> StoreResult<Inventory>;

    /// Writes every document in `docs` plus the entries of `inventory` that
    /// correspond to them, atomically.
    async fn write_batch(
        &self,
        backend: &dyn StorageBackend,
        codec: &RecordCodec,
        inventory: &Inventory,
        docs: &[DocumentRecord],
    ) -> StoreResult<()>;

    async fn read_doc(
        &self,
        backend: &dyn StorageBackend,
        codec: &RecordCodec,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<DocumentRecord>>;

    async fn read_docs_bulk(
        &self,
        backend: &dyn StorageBackend,
        codec: &RecordCodec,
        collection: &str,
        ids: &[String],
    ) -> StoreResult<Vec<DocumentRecord>>;

    async fn delete_doc(
        &self,
        backend: &dyn StorageBackend,
        collection: &str,
        id: &str,
    ) -> StoreResult<()>;

    fn inventory_kind(&self) -> InventoryKind;
}
