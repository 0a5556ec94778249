//! In-memory mock storage backend. Doubles as the teacher's null-backend
//! role for coordinator/batcher unit tests that don't want real I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use doc_core::StoreResult;
use tokio::sync::Mutex;

use crate::storage::backend::{StorageBackend, StoredRecord, WriteBatch};

#[derive(Default)]
pub struct MemoryBackend {
    stores: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
    ready: AtomicBool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn initialize(&self) -> StoreResult<()> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write_records(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut stores = self.stores.lock().await;
        for (store, records) in batch.stores() {
            let entry = stores.entry(store.to_string()).or_default();
            for record in records {
                entry.insert(record.id.clone(), record.payload.clone());
            }
        }
        Ok(())
    }

    async fn read_record(&self, store: &str, id: &str) -> StoreResult<Option<Vec<u8>>> {
        let stores = self.stores.lock().await;
        Ok(stores.get(store).and_then(|m| m.get(id).cloned()))
    }

    async fn read_records_bulk(
        &self,
        store: &str,
        ids: &[String],
    ) -> StoreResult<Option<Vec<StoredRecord>>> {
        let stores = self.stores.lock().await;
        let Some(map) = stores.get(store) else {
            return Ok(Some(Vec::new()));
        };
        let found = ids
            .iter()
            .filter_map(|id| map.get(id).map(|payload| StoredRecord { id: id.clone(), payload: payload.clone() }))
            .collect();
        Ok(Some(found))
    }

    async fn read_all_records(&self, store: &str) -> StoreResult<Vec<StoredRecord>> {
        let stores = self.stores.lock().await;
        Ok(stores
            .get(store)
            .map(|m| {
                m.iter()
                    .map(|(id, payload)| StoredRecord { id: id.clone(), payload: payload.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_record(&self, store: &str, id: &str) -> StoreResult<()> {
        let mut stores = self.stores.lock().await;
        if let Some(map) = stores.get_mut(store) {
            map.remove(id);
        }
        Ok(())
    }

    async fn clear_store(&self, store: &str) -> StoreResult<()> {
        let mut stores = self.stores.lock().await;
        stores.remove(store);
        Ok(())
    }

    async fn clear_all(&self) -> StoreResult<()> {
        let mut stores = self.stores.lock().await;
        stores.clear();
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&self) -> StoreResult<()> {
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_record() {
        let backend = MemoryBackend::new();
        backend.initialize().await.unwrap();
        let mut batch = WriteBatch::default();
        batch.insert("docs", "a1", vec![1, 2, 3]);
        backend.write_records(batch).await.unwrap();

        let found = backend.read_record("docs", "a1").await.unwrap();
        assert_eq!(found, Some(vec![1, 2, 3]));
        assert!(backend.read_record("docs", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_all_drops_every_store() {
        let backend = MemoryBackend::new();
        let mut batch = WriteBatch::default();
        batch.insert("docs", "a1", vec![1]);
        batch.insert("meta", "inventory", vec![2]);
        backend.write_records(batch).await.unwrap();

        backend.clear_all().await.unwrap();

        assert!(backend.read_record("docs", "a1").await.unwrap().is_none());
        assert!(backend.read_record("meta", "inventory").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bulk_read_supported_natively() {
        let backend = MemoryBackend::new();
        let mut batch = WriteBatch::default();
        batch.insert("docs", "a1", vec![1]);
        batch.insert("docs", "a2", vec![2]);
        backend.write_records(batch).await.unwrap();

        let ids = vec!["a1".to_string(), "a2".to_string(), "a3".to_string()];
        let found = backend.read_records_bulk("docs", &ids).await.unwrap().unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn close_clears_ready_flag() {
        let backend = MemoryBackend::new();
        backend.initialize().await.unwrap();
        assert!(backend.is_ready());
        backend.close().await.unwrap();
        assert!(!backend.is_ready());
    }
}
