//! On-disk storage backend built on `redb`. One table per logical store
//! name, opened lazily the first time a write or read touches it.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use doc_core::StoreError;
use doc_core::StoreResult;
use redb::TableDefinition;

use crate::storage::backend::{StorageBackend, StoredRecord, WriteBatch};

pub struct RedbBackend {
    db: Arc<redb::Database>,
    ready: AtomicBool,
}

impl RedbBackend {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = redb::Database::create(path).map_err(|e| StoreError::BackendFailure(e.into()))?;
        Ok(Self { db: Arc::new(db), ready: AtomicBool::new(false) })
    }

    async fn run_blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<redb::Database>) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| StoreError::BackendFailure(e.into()))?
    }
}

#[async_trait]
impl StorageBackend for RedbBackend {
    async fn initialize(&self) -> StoreResult<()> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write_records(&self, batch: WriteBatch) -> StoreResult<()> {
        let owned: Vec<(String, Vec<StoredRecord>)> = batch
            .stores()
            .map(|(name, records)| (name.to_string(), records.to_vec()))
            .collect();

        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(|e| StoreError::BackendFailure(e.into()))?;
            for (store, records) in &owned {
                let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(store);
                let mut table = txn
                    .open_table(table_def)
                    .map_err(|e| StoreError::BackendFailure(e.into()))?;
                for record in records {
                    table
                        .insert(record.id.as_str(), record.payload.as_slice())
                        .map_err(|e| StoreError::BackendFailure(e.into()))?;
                }
            }
            txn.commit().map_err(|e| StoreError::BackendFailure(e.into()))?;
            Ok(())
        })
        .await
    }

    async fn read_record(&self, store: &str, id: &str) -> StoreResult<Option<Vec<u8>>> {
        let store = store.to_string();
        let id = id.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(|e| StoreError::BackendFailure(e.into()))?;
            let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&store);
            let table = match txn.open_table(table_def) {
                Ok(t) => t,
                Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(e) => return Err(StoreError::BackendFailure(e.into())),
            };
            match table.get(id.as_str()).map_err(|e| StoreError::BackendFailure(e.into()))? {
                Some(guard) => Ok(Some(guard.value().to_vec())),
                None => Ok(None),
            }
        })
        .await
    }

    async fn read_records_bulk(
        &self,
        _store: &str,
        _ids: &[String],
    ) -> StoreResult<Option<Vec<StoredRecord>>> {
        // No cheaper than N single gets against this layout; let the caller fall back.
        Ok(None)
    }

    async fn read_all_records(&self, store: &str) -> StoreResult<Vec<StoredRecord>> {
        let store = store.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(|e| StoreError::BackendFailure(e.into()))?;
            let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&store);
            let table = match txn.open_table(table_def) {
                Ok(t) => t,
                Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(e) => return Err(StoreError::BackendFailure(e.into())),
            };
            let mut out = Vec::new();
            for entry in table.iter().map_err(|e| StoreError::BackendFailure(e.into()))? {
                let (key, value) = entry.map_err(|e| StoreError::BackendFailure(e.into()))?;
                out.push(StoredRecord { id: key.value().to_string(), payload: value.value().to_vec() });
            }
            Ok(out)
        })
        .await
    }

    async fn delete_record(&self, store: &str, id: &str) -> StoreResult<()> {
        let store = store.to_string();
        let id = id.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(|e| StoreError::BackendFailure(e.into()))?;
            {
                let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&store);
                let mut table = txn
                    .open_table(table_def)
                    .map_err(|e| StoreError::BackendFailure(e.into()))?;
                table.remove(id.as_str()).map_err(|e| StoreError::BackendFailure(e.into()))?;
            }
            txn.commit().map_err(|e| StoreError::BackendFailure(e.into()))?;
            Ok(())
        })
        .await
    }

    async fn clear_store(&self, store: &str) -> StoreResult<()> {
        let store = store.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(|e| StoreError::BackendFailure(e.into()))?;
            let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&store);
            txn.delete_table(table_def).map_err(|e| StoreError::BackendFailure(e.into()))?;
            txn.commit().map_err(|e| StoreError::BackendFailure(e.into()))?;
            Ok(())
        })
        .await
    }

    async fn clear_all(&self) -> StoreResult<()> {
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(|e| StoreError::BackendFailure(e.into()))?;
            let names: Vec<String> = txn
                .list_tables()
                .map_err(|e| StoreError::BackendFailure(e.into()))?
                .map(|handle| handle.name().to_string())
                .collect();
            for name in names {
                let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&name);
                txn.delete_table(table_def).map_err(|e| StoreError::BackendFailure(e.into()))?;
            }
            txn.commit().map_err(|e| StoreError::BackendFailure(e.into()))?;
            Ok(())
        })
        .await
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&self) -> StoreResult<()> {
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}
