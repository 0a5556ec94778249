//! The durable-store coordinator: owns the in-memory inventory, drives the
//! write batcher against a schema strategy and storage backend, validates
//! version monotonicity, and fans out lifecycle events to observers.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use doc_core::{
    DocSnapshot, DocumentRecord, Inventory, InventoryEntry, OpErrorCallback, OtTypeRegistry,
    RestorableDoc, SharedError, StoreError, StoreResult, Version, VersionDecoder,
};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::batcher::{QueueItem, WriteQueue};
use crate::codec::RecordCodec;
use crate::observer::{CompositeCoordinatorObserver, CoordinatorObserver};
use crate::schema::SchemaStrategy;
use crate::storage::backend::StorageBackend;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub max_batch_size: usize,
    pub auto_flush: bool,
    pub debug: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { max_batch_size: 10, auto_flush: true, debug: false }
    }
}

pub struct DurableStoreCoordinator {
    backend: Arc<dyn StorageBackend>,
    schema: Arc<dyn SchemaStrategy>,
    codec: RecordCodec,
    config: CoordinatorConfig,
    version_decoder: Option<VersionDecoder>,
    op_error_callback: OpErrorCallback,
    observer: Arc<dyn CoordinatorObserver>,
    inventory: Mutex<Inventory>,
    queue: Mutex<WriteQueue>,
    ready: AtomicBool,
}

impl DurableStoreCoordinator {
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        schema: Arc<dyn SchemaStrategy>,
        codec: RecordCodec,
        config: CoordinatorConfig,
    ) -> Self {
        let queue = Mutex::new(WriteQueue::new(config.max_batch_size, config.auto_flush));
        Self {
            backend,
            schema,
            codec,
            version_decoder: None,
            op_error_callback: Arc::new(|_| {}),
            observer: Arc::new(CompositeCoordinatorObserver::default()),
            inventory: Mutex::new(Inventory::default()),
            queue,
            ready: AtomicBool::new(false),
            config,
        }
    }

    #[must_use]
    pub fn with_version_decoder(mut self, decoder: VersionDecoder) -> Self {
        self.version_decoder = Some(decoder);
        self
    }

    #[must_use]
    pub fn with_op_error_callback(mut self, callback: OpErrorCallback) -> Self {
        self.op_error_callback = callback;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CoordinatorObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn ensure_ready(&self) -> StoreResult<()> {
        if self.ready.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::NotReady)
        }
    }

    pub async fn initialize(&self) -> StoreResult<()> {
        info!("initializing durable store coordinator");
        self.backend.initialize().await?;
        self.schema.initialize_schema(self.backend.as_ref()).await?;
        let inventory = self.schema.read_inventory(self.backend.as_ref()).await?;
        *self.inventory.lock().await = inventory;
        self.ready.store(true, AtomicOrdering::SeqCst);
        self.observer.on_ready();
        Ok(())
    }

    pub async fn close(&self) -> StoreResult<()> {
        info!("closing durable store coordinator");
        self.ready.store(false, AtomicOrdering::SeqCst);
        self.backend.close().await
    }

    // ---- enqueue path -------------------------------------------------

    fn compute_inventory_version(&self, doc: &DocumentRecord) -> Option<Version> {
        match &self.version_decoder {
            Some(decoder) => doc.data.as_ref().and_then(|data| decoder(Some(data))),
            None => doc.version.map(Version::Number),
        }
    }

    fn validate_one(&self, inventory: &Inventory, doc: &DocumentRecord) -> StoreResult<InventoryEntry> {
        let candidate = self.compute_inventory_version(doc);
        if let Some(existing) = inventory.get(&doc.collection, &doc.id) {
            if let (Some(stored), Some(attempted)) = (&existing.v, &candidate) {
                match stored.compare(attempted) {
                    None => {
                        return Err(StoreError::VersionTypeMismatch {
                            collection: doc.collection.clone(),
                            id: doc.id.clone(),
                            stored_kind: stored.kind_name(),
                            attempted_kind: attempted.kind_name(),
                        });
                    }
                    Some(Ordering::Greater) => {
                        return Err(StoreError::VersionRegression {
                            collection: doc.collection.clone(),
                            id: doc.id.clone(),
                            stored: Some(stored.clone()),
                            attempted: attempted.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(InventoryEntry { v: candidate, p: doc.has_pending_work() })
    }

    fn substitute_inflight_src(snapshot: &mut DocSnapshot) {
        if let Some(op) = snapshot.inflight_op.as_mut() {
            if op.src.is_none() {
                op.src.clone_from(&snapshot.connection_id);
            }
        }
    }

    pub async fn put_doc(&self, mut snapshot: DocSnapshot) -> Result<(), SharedError> {
        self.ensure_ready().map_err(Arc::new)?;
        Self::substitute_inflight_src(&mut snapshot);
        let record = DocumentRecord::from(snapshot);
        let (tx, rx) = oneshot::channel();
        {
            let mut queue = self.queue.lock().await;
            queue.push(QueueItem { record, enqueued_at_ms: now_millis(), responder: tx });
        }
        self.maybe_start_drain().await;
        rx.await.unwrap_or_else(|_| {
            Err(Arc::new(StoreError::Other(anyhow::anyhow!(
                "coordinator dropped before the batch finished"
            ))))
        })
    }

    pub async fn put_docs_bulk(&self, snapshots: Vec<DocSnapshot>) -> Result<(), SharedError> {
        self.ensure_ready().map_err(Arc::new)?;
        if snapshots.is_empty() {
            return Ok(());
        }

        let previous_auto_flush = {
            let mut queue = self.queue.lock().await;
            let previous = queue.auto_flush();
            queue.set_auto_flush(false);
            previous
        };

        let mut receivers = Vec::with_capacity(snapshots.len());
        for mut snapshot in snapshots {
            Self::substitute_inflight_src(&mut snapshot);
            let record = DocumentRecord::from(snapshot);
            let (tx, rx) = oneshot::channel();
            receivers.push(rx);
            let mut queue = self.queue.lock().await;
            queue.push(QueueItem { record, enqueued_at_ms: now_millis(), responder: tx });
        }

        let _ = self.flush().await;

        {
            let mut queue = self.queue.lock().await;
            queue.set_auto_flush(previous_auto_flush);
            let restart = previous_auto_flush && !queue.is_empty() && !queue.is_busy();
            drop(queue);
            if restart {
                self.maybe_start_drain().await;
            }
        }

        let mut first_error = None;
        for rx in receivers {
            if let Ok(Err(err)) = rx.await {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn maybe_start_drain(&self) {
        self.drain_loop(false).await;
    }

    async fn drain_loop(&self, ignore_auto_flush: bool) {
        loop {
            let batch = {
                let mut queue = self.queue.lock().await;
                let gate = ignore_auto_flush || queue.auto_flush();
                if !gate || queue.is_busy() || !self.ready.load(AtomicOrdering::SeqCst) {
                    None
                } else {
                    queue.start_drain()
                }
            };
            let Some(batch) = batch else { break };

            self.run_batch(batch).await;

            let (more, waiters) = {
                let mut queue = self.queue.lock().await;
                let more = queue.finish_drain();
                let waiters = if more { Vec::new() } else { queue.take_flush_waiters() };
                (more, waiters)
            };
            for waiter in waiters {
                let _ = waiter.send(());
            }
            if !more {
                self.observer.on_no_persist_pending();
                break;
            }
        }
    }

    async fn run_batch(&self, batch: Vec<QueueItem>) {
        if self.config.debug {
            debug!(batch_size = batch.len(), "draining write batch");
        }
        let mut inventory = self.inventory.lock().await;

        let mut new_entries = Vec::with_capacity(batch.len());
        let mut validation_error = None;
        for item in &batch {
            match self.validate_one(&inventory, &item.record) {
                Ok(entry) => new_entries.push((item.record.collection.clone(), item.record.id.clone(), entry)),
                Err(err) => {
                    validation_error = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = validation_error {
            drop(inventory);
            let shared = Arc::new(err);
            for item in batch {
                let _ = item.responder.send(Err(Arc::clone(&shared)));
            }
            return;
        }

        let mut previous_entries = Vec::with_capacity(new_entries.len());
        for (collection, id, _) in &new_entries {
            previous_entries.push((collection.clone(), id.clone(), inventory.get(collection, id).cloned()));
        }
        for (collection, id, entry) in &new_entries {
            inventory.set(collection, id, entry.clone());
        }
        let inventory_snapshot = inventory.clone();
        let docs: Vec<DocumentRecord> = batch.iter().map(|item| item.record.clone()).collect();
        drop(inventory);

        self.observer.on_before_persist(&docs);

        match self.schema.write_batch(self.backend.as_ref(), &self.codec, &inventory_snapshot, &docs).await {
            Ok(()) => {
                self.observer.on_persist(&docs);
                for item in batch {
                    let _ = item.responder.send(Ok(()));
                }
            }
            Err(err) => {
                warn!(error = %err, "batch commit failed, rolling back in-memory inventory");
                let mut inventory = self.inventory.lock().await;
                for (collection, id, previous) in previous_entries {
                    match previous {
                        Some(entry) => inventory.set(&collection, &id, entry),
                        None => inventory.remove(&collection, &id),
                    }
                }
                drop(inventory);

                self.observer.on_persist(&docs);
                let shared = Arc::new(err);
                self.observer.on_error(&shared);
                error!(error = %shared, "batch dropped");
                for item in batch {
                    let _ = item.responder.send(Err(Arc::clone(&shared)));
                }
            }
        }
    }

    pub async fn flush(&self) -> StoreResult<()> {
        self.ensure_ready()?;
        let rx = {
            let mut queue = self.queue.lock().await;
            if queue.is_empty() && !queue.is_busy() {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            queue.register_flush_waiter(tx);
            rx
        };
        self.drain_loop(true).await;
        let _ = rx.await;
        Ok(())
    }

    pub async fn set_auto_flush(&self, enabled: bool) {
        let should_start = {
            let mut queue = self.queue.lock().await;
            queue.set_auto_flush(enabled);
            enabled && !queue.is_busy() && !queue.is_empty()
        };
        if should_start {
            self.maybe_start_drain().await;
        }
    }

    pub async fn is_auto_flush(&self) -> bool {
        self.queue.lock().await.auto_flush()
    }

    pub async fn write_queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn has_pending_writes(&self) -> bool {
        self.write_queue_size().await > 0
    }

    // ---- read path ------------------------------------------------------

    pub async fn get_doc(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentRecord>> {
        self.ensure_ready()?;
        self.schema.read_doc(self.backend.as_ref(), &self.codec, collection, id).await
    }

    pub async fn get_docs_bulk(&self, collection: &str, ids: &[String]) -> StoreResult<Vec<DocumentRecord>> {
        self.ensure_ready()?;
        self.schema.read_docs_bulk(self.backend.as_ref(), &self.codec, collection, ids).await
    }

    pub async fn is_doc_in_inventory(
        &self,
        collection: &str,
        id: &str,
        min_version: Option<&Version>,
    ) -> StoreResult<bool> {
        self.ensure_ready()?;
        let inventory = self.inventory.lock().await;
        let Some(entry) = inventory.get(collection, id) else { return Ok(false) };
        let Some(min_version) = min_version else { return Ok(true) };
        match &entry.v {
            None => Ok(false),
            Some(stored) => match stored.compare(min_version) {
                Some(ord) => Ok(ord != Ordering::Less),
                None => Err(StoreError::VersionTypeMismatch {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    stored_kind: stored.kind_name(),
                    attempted_kind: min_version.kind_name(),
                }),
            },
        }
    }

    pub async fn has_pending_docs(&self) -> bool {
        let inventory = self.inventory.lock().await;
        inventory.iter_entries().any(|(_, _, entry)| entry.p)
    }

    pub async fn for_each_pending_doc_collection_id<F: FnMut(&str, &str)>(&self, mut visit: F) {
        let inventory = self.inventory.lock().await;
        for (collection, id, entry) in inventory.iter_entries() {
            if entry.p {
                visit(collection, id);
            }
        }
    }

    pub async fn restore_doc_from_durable_record(
        &self,
        doc: &mut dyn RestorableDoc,
        registry: &dyn OtTypeRegistry,
    ) -> StoreResult<()> {
        self.ensure_ready()?;
        let Some(record) = self.schema.read_doc(self.backend.as_ref(), &self.codec, doc.collection(), doc.id()).await? else {
            return Ok(());
        };

        doc.set_version(record.version);
        doc.set_data(record.data);
        doc.set_type(record.type_name, registry);
        doc.set_prevent_compose(record.prevent_compose);
        doc.set_submit_source(record.submit_source);

        let mut pending = record.pending_ops;
        if let Some(inflight) = record.inflight_op {
            pending.insert(0, inflight);
        }
        doc.set_pending_ops(pending);
        doc.attach_op_error_callback(Arc::clone(&self.op_error_callback));
        doc.emit_restore();
        Ok(())
    }

    pub async fn delete_database(&self) -> StoreResult<()> {
        info!("deleting database");
        self.backend.clear_all().await?;
        self.schema.initialize_schema(self.backend.as_ref()).await?;
        *self.inventory.lock().await = Inventory::default();
        {
            let mut queue = self.queue.lock().await;
            *queue = WriteQueue::new(self.config.max_batch_size, self.config.auto_flush);
        }
        self.ready.store(false, AtomicOrdering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use doc_core::OpRecord;

    use super::*;
    use crate::backends::memory::MemoryBackend;
    use crate::schema::SingleTableSchema;

    fn coordinator() -> DurableStoreCoordinator {
        DurableStoreCoordinator::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(SingleTableSchema),
            RecordCodec::plain(),
            CoordinatorConfig { max_batch_size: 10, auto_flush: true, debug: false },
        )
    }

    fn snapshot(collection: &str, id: &str, version: i64) -> DocSnapshot {
        DocSnapshot {
            collection: collection.into(),
            id: id.into(),
            type_name: Some("rich-text".into()),
            version: Some(version),
            data: Some(serde_json::json!({"body": "hi"})),
            pending_ops: vec![],
            inflight_op: None,
            prevent_compose: false,
            submit_source: false,
            connection_id: Some("conn-1".into()),
        }
    }

    #[tokio::test]
    async fn ops_before_initialize_return_not_ready() {
        let coordinator = coordinator();
        let err = coordinator.put_doc(snapshot("docs", "a1", 1)).await.unwrap_err();
        assert!(matches!(*err, StoreError::NotReady));
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let coordinator = coordinator();
        coordinator.initialize().await.unwrap();

        coordinator.put_doc(snapshot("docs", "a1", 1)).await.unwrap();

        let doc = coordinator.get_doc("docs", "a1").await.unwrap().unwrap();
        assert_eq!(doc.version, Some(1));
        assert!(coordinator.is_doc_in_inventory("docs", "a1", None).await.unwrap());
    }

    #[tokio::test]
    async fn version_regression_is_rejected_and_inventory_unchanged() {
        let coordinator = coordinator();
        coordinator.initialize().await.unwrap();
        coordinator.put_doc(snapshot("docs", "a1", 3)).await.unwrap();

        let err = coordinator.put_doc(snapshot("docs", "a1", 2)).await.unwrap_err();
        assert!(matches!(*err, StoreError::VersionRegression { .. }));

        let doc = coordinator.get_doc("docs", "a1").await.unwrap().unwrap();
        assert_eq!(doc.version, Some(3));

        coordinator.put_doc(snapshot("docs", "a1", 3)).await.unwrap();
        let doc = coordinator.get_doc("docs", "a1").await.unwrap().unwrap();
        assert_eq!(doc.version, Some(3));
    }

    #[tokio::test]
    async fn flush_on_empty_queue_resolves_immediately() {
        let coordinator = coordinator();
        coordinator.initialize().await.unwrap();
        coordinator.flush().await.unwrap();
    }

    #[tokio::test]
    async fn bulk_empty_input_is_a_no_op() {
        let coordinator = coordinator();
        coordinator.initialize().await.unwrap();
        coordinator.put_docs_bulk(vec![]).await.unwrap();
        assert_eq!(coordinator.write_queue_size().await, 0);
    }

    #[tokio::test]
    async fn bulk_put_restores_previous_auto_flush_setting() {
        let coordinator = coordinator();
        coordinator.initialize().await.unwrap();
        coordinator.set_auto_flush(false).await;

        coordinator
            .put_docs_bulk(vec![snapshot("docs", "a1", 1), snapshot("docs", "a2", 1)])
            .await
            .unwrap();

        assert!(!coordinator.is_auto_flush().await);
        let doc = coordinator.get_doc("docs", "a1").await.unwrap();
        assert!(doc.is_some());
    }

    #[tokio::test]
    async fn missing_src_on_inflight_op_is_substituted_from_connection() {
        let coordinator = coordinator();
        coordinator.initialize().await.unwrap();

        let mut snap = snapshot("docs", "a1", 1);
        snap.inflight_op = Some(OpRecord { op: serde_json::json!({}), src: None, seq: 1, v: 1, source: true });
        coordinator.put_doc(snap).await.unwrap();

        let doc = coordinator.get_doc("docs", "a1").await.unwrap().unwrap();
        assert_eq!(doc.inflight_op.unwrap().src.as_deref(), Some("conn-1"));
    }

    #[tokio::test]
    async fn pending_docs_are_tracked_and_iterable() {
        let coordinator = coordinator();
        coordinator.initialize().await.unwrap();

        let mut snap = snapshot("docs", "a1", 1);
        snap.pending_ops = vec![OpRecord::default()];
        coordinator.put_doc(snap).await.unwrap();

        assert!(coordinator.has_pending_docs().await);
        let mut seen = Vec::new();
        coordinator.for_each_pending_doc_collection_id(|c, id| seen.push((c.to_string(), id.to_string()))).await;
        assert_eq!(seen, vec![("docs".to_string(), "a1".to_string())]);
    }

    #[tokio::test]
    async fn delete_database_resets_inventory_and_requires_reinitialize() {
        let coordinator = coordinator();
        coordinator.initialize().await.unwrap();
        coordinator.put_doc(snapshot("docs", "a1", 1)).await.unwrap();

        coordinator.delete_database().await.unwrap();

        let err = coordinator.get_doc("docs", "a1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotReady));

        coordinator.initialize().await.unwrap();
        assert!(coordinator.get_doc("docs", "a1").await.unwrap().is_none());
    }
}
