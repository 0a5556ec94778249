//! Single-table strategy: every document lives in one `docs` store keyed by
//! `collection/id`, and the whole inventory is one JSON-shaped blob under
//! `meta/inventory`.

use async_trait::async_trait;
use doc_core::{DocumentRecord, Inventory, StoreError, StoreResult};

use crate::codec::RecordCodec;
use crate::storage::backend::{StorageBackend, WriteBatch};
use crate::storage::bulk::read_bulk_or_fallback;

use super::strategy::{InventoryKind, SchemaStrategy};

const STORE_DOCS: &str = "docs";
const STORE_META: &str = "meta";
const KEY_INVENTORY: &str = "inventory";

#[derive(Debug, Default, Clone, Copy)]
pub struct SingleTableSchema;

fn doc_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

#[async_trait]
impl SchemaStrategy for SingleTableSchema {
    async fn initialize_schema(&self, backend: &dyn StorageBackend) -> StoreResult<()> {
        if backend.read_record(STORE_META, KEY_INVENTORY).await?.is_none() {
            let bytes = rmp_serde::to_vec(&Inventory::default()).map_err(|e| StoreError::Other(e.into()))?;
            let mut batch = WriteBatch::default();
            batch.insert(STORE_META, KEY_INVENTORY, bytes);
            backend.write_records(batch).await?;
        }
        Ok(())
    }

    async fn read_inventory(&self, backend: &dyn StorageBackend) -> StoreResult<Inventory> {
        match backend.read_record(STORE_META, KEY_INVENTORY).await? {
            Some(bytes) => rmp_serde::from_slice(&bytes).map_err(|e| StoreError::DecodeFailure(e.into())),
            None => Ok(Inventory::default()),
        }
    }

    async fn write_batch(
        &self,
        backend: &dyn StorageBackend,
        codec: &RecordCodec,
        inventory: &Inventory,
        docs: &[DocumentRecord],
    ) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        let inv_bytes = rmp_serde::to_vec(inventory).map_err(|e| StoreError::Other(e.into()))?;
        batch.insert(STORE_META, KEY_INVENTORY, inv_bytes);
        for doc in docs {
            let bytes = codec.encode_doc(doc)?;
            batch.insert(STORE_DOCS, doc.storage_key(), bytes);
        }
        backend.write_records(batch).await
    }

    async fn read_doc(
        &self,
        backend: &dyn StorageBackend,
        codec: &RecordCodec,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<DocumentRecord>> {
        match backend.read_record(STORE_DOCS, &doc_key(collection, id)).await? {
            Some(bytes) => Ok(Some(codec.decode_doc(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn read_docs_bulk(
        &self,
        backend: &dyn StorageBackend,
        codec: &RecordCodec,
        collection: &str,
        ids: &[String],
    ) -> StoreResult<Vec<DocumentRecord>> {
        let keys: Vec<String> = ids.iter().map(|id| doc_key(collection, id)).collect();
        let rows = read_bulk_or_fallback(backend, STORE_DOCS, &keys).await?;
        rows.iter().map(|row| codec.decode_doc(&row.payload)).collect()
    }

    async fn delete_doc(&self, backend: &dyn StorageBackend, collection: &str, id: &str) -> StoreResult<()> {
        backend.delete_record(STORE_DOCS, &doc_key(collection, id)).await
    }

    fn inventory_kind(&self) -> InventoryKind {
        InventoryKind::Json
    }
}

#[cfg(test)]
mod tests {
    use doc_core::InventoryEntry;
    use doc_core::Version;

    use super::*;
    use crate::backends::memory::MemoryBackend;

    fn sample_doc(id: &str) -> DocumentRecord {
        DocumentRecord {
            collection: "docs".into(),
            id: id.into(),
            type_name: None,
            version: Some(1),
            data: Some(serde_json::json!({"body": id})),
            pending_ops: vec![],
            inflight_op: None,
            prevent_compose: false,
            submit_source: false,
        }
    }

    #[tokio::test]
    async fn first_run_inventory_is_empty() {
        let backend = MemoryBackend::new();
        backend.initialize().await.unwrap();
        let schema = SingleTableSchema;
        schema.initialize_schema(&backend).await.unwrap();

        let inv = schema.read_inventory(&backend).await.unwrap();
        assert_eq!(inv.iter_entries().count(), 0);
    }

    #[tokio::test]
    async fn write_batch_persists_docs_and_inventory_together() {
        let backend = MemoryBackend::new();
        backend.initialize().await.unwrap();
        let schema = SingleTableSchema;
        let codec = RecordCodec::plain();

        let mut inventory = Inventory::default();
        inventory.set("docs", "a1", InventoryEntry { v: Some(Version::Number(1)), p: false });
        let docs = vec![sample_doc("a1")];

        schema.write_batch(&backend, &codec, &inventory, &docs).await.unwrap();

        let read_back = schema.read_inventory(&backend).await.unwrap();
        assert_eq!(read_back.get("docs", "a1").unwrap().v, Some(Version::Number(1)));

        let doc = schema.read_doc(&backend, &codec, "docs", "a1").await.unwrap().unwrap();
        assert_eq!(doc.id, "a1");
    }

    #[tokio::test]
    async fn read_docs_bulk_skips_missing_ids() {
        let backend = MemoryBackend::new();
        backend.initialize().await.unwrap();
        let schema = SingleTableSchema;
        let codec = RecordCodec::plain();
        let inventory = Inventory::default();
        let docs = vec![sample_doc("a1"), sample_doc("a2")];
        schema.write_batch(&backend, &codec, &inventory, &docs).await.unwrap();

        let ids = vec!["a1".to_string(), "missing".to_string(), "a2".to_string()];
        let found = schema.read_docs_bulk(&backend, &codec, "docs", &ids).await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
