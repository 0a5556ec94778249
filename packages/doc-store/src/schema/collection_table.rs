//! Collection-per-table strategy: each declared collection gets its own store,
//! with declared fields extracted into a first-class `indexed` column plus a
//! catch-all serialized payload, and a dedicated `inventory` store keyed by
//! `collection/id` for point-lookup membership tests instead of decoding one
//! whole-inventory blob.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use doc_core::{DocumentRecord, Inventory, InventoryEntry, OpRecord, StoreError, StoreResult};
use serde::{Deserialize, Serialize};

use crate::codec::RecordCodec;
use crate::storage::backend::{StorageBackend, WriteBatch};
use crate::storage::bulk::read_bulk_or_fallback;

use super::strategy::{InventoryKind, SchemaStrategy};

const STORE_INVENTORY: &str = "inventory";

/// Per-collection physical layout declaration.
#[derive(Debug, Clone, Default)]
pub struct CollectionTableConfig {
    /// Top-level `data` fields extracted into the row's `indexed` column.
    pub indexed_fields: Vec<String>,
    /// Top-level `data` fields encrypted individually rather than as part of
    /// the whole-document payload.
    pub encrypted_fields: Vec<String>,
}

#[derive(Default)]
pub struct CollectionPerTableSchema {
    configs: HashMap<String, CollectionTableConfig>,
}

impl CollectionPerTableSchema {
    #[must_use]
    pub fn new(configs: HashMap<String, CollectionTableConfig>) -> Self {
        Self { configs }
    }

    fn config_for(&self, collection: &str) -> StoreResult<&CollectionTableConfig> {
        self.configs
            .get(collection)
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("undeclared collection: {collection}")))
    }
}

#[derive(Serialize, Deserialize)]
struct CollectionRow {
    indexed: BTreeMap<String, serde_json::Value>,
    data: Option<serde_json::Value>,
    type_name: Option<String>,
    version: Option<i64>,
    pending_ops: Vec<OpRecord>,
    inflight_op: Option<OpRecord>,
    prevent_compose: bool,
    submit_source: bool,
}

fn split_inventory_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
}

fn encode_row(codec: &RecordCodec, cfg: &CollectionTableConfig, doc: &DocumentRecord) -> StoreResult<Vec<u8>> {
    let mut indexed = BTreeMap::new();
    if let Some(serde_json::Value::Object(map)) = &doc.data {
        for field in &cfg.indexed_fields {
            if let Some(value) = map.get(field) {
                indexed.insert(field.clone(), value.clone());
            }
        }
    }

    let mut data = doc.data.clone();
    if let Some(serde_json::Value::Object(map)) = &mut data {
        for field in &cfg.encrypted_fields {
            if let Some(value) = map.get(field) {
                let encrypted = codec.encrypt_field(value)?;
                map.insert(field.clone(), encrypted);
            }
        }
    }

    let row = CollectionRow {
        indexed,
        data,
        type_name: doc.type_name.clone(),
        version: doc.version,
        pending_ops: doc.pending_ops.clone(),
        inflight_op: doc.inflight_op.clone(),
        prevent_compose: doc.prevent_compose,
        submit_source: doc.submit_source,
    };
    rmp_serde::to_vec(&row).map_err(|e| StoreError::Other(e.into()))
}

fn decode_row(
    codec: &RecordCodec,
    cfg: &CollectionTableConfig,
    collection: &str,
    id: &str,
    bytes: &[u8],
) -> StoreResult<DocumentRecord> {
    let row: CollectionRow = rmp_serde::from_slice(bytes).map_err(|e| StoreError::DecodeFailure(e.into()))?;
    let mut data = row.data;
    if let Some(serde_json::Value::Object(map)) = &mut data {
        for field in &cfg.encrypted_fields {
            if let Some(value) = map.get(field).cloned() {
                let decrypted = codec.decrypt_field(&value)?;
                map.insert(field.clone(), decrypted);
            }
        }
    }

    Ok(DocumentRecord {
        collection: collection.to_string(),
        id: id.to_string(),
        type_name: row.type_name,
        version: row.version,
        data,
        pending_ops: row.pending_ops,
        inflight_op: row.inflight_op,
        prevent_compose: row.prevent_compose,
        submit_source: row.submit_source,
    })
}

#[async_trait]
impl SchemaStrategy for CollectionPerTableSchema {
    async fn initialize_schema(&self, _backend: &dyn StorageBackend) -> StoreResult<()> {
        // Stores are created lazily on first write; nothing to pre-seed.
        Ok(())
    }

    async fn read_inventory(&self, backend: &dyn StorageBackend) -> StoreResult<Inventory> {
        let mut inventory = Inventory::default();
        for row in backend.read_all_records(STORE_INVENTORY).await? {
            let Some((collection, id)) = split_inventory_key(&row.id) else { continue };
            let entry: InventoryEntry =
                rmp_serde::from_slice(&row.payload).map_err(|e| StoreError::DecodeFailure(e.into()))?;
            inventory.set(collection, id, entry);
        }
        Ok(inventory)
    }

    async fn write_batch(
        &self,
        backend: &dyn StorageBackend,
        codec: &RecordCodec,
        inventory: &Inventory,
        docs: &[DocumentRecord],
    ) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for doc in docs {
            let cfg = self.config_for(&doc.collection)?;
            let row_bytes = encode_row(codec, cfg, doc)?;
            batch.insert(doc.collection.clone(), doc.id.clone(), row_bytes);

            let entry = inventory
                .get(&doc.collection, &doc.id)
                .cloned()
                .unwrap_or(InventoryEntry { v: None, p: false });
            let inv_bytes = rmp_serde::to_vec(&entry).map_err(|e| StoreError::Other(e.into()))?;
            batch.insert(STORE_INVENTORY, format!("{}/{}", doc.collection, doc.id), inv_bytes);
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
        let cfg = self.config_for(collection)?;
        match backend.read_record(collection, id).await? {
            Some(bytes) => Ok(Some(decode_row(codec, cfg, collection, id, &bytes)?)),
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
        let cfg = self.config_for(collection)?;
        let rows = read_bulk_or_fallback(backend, collection, ids).await?;
        rows.iter()
            .map(|row| decode_row(codec, cfg, collection, &row.id, &row.payload))
            .collect()
    }

    async fn delete_doc(&self, backend: &dyn StorageBackend, collection: &str, id: &str) -> StoreResult<()> {
        backend.delete_record(collection, id).await?;
        backend.delete_record(STORE_INVENTORY, &format!("{collection}/{id}")).await
    }

    fn inventory_kind(&self) -> InventoryKind {
        InventoryKind::Table
    }
}
