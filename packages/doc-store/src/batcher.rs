//! The write-batcher's pure queue logic: FIFO ordering with duplicate-key
//! splitting, a max batch size, and flush-waiter bookkeeping. Kept free of
//! I/O and `async` so it's cheap to unit test in isolation; the coordinator
//! drives it from an async drain loop.

use std::collections::{HashSet, VecDeque};

use doc_core::{DocumentRecord, SharedError};
use tokio::sync::oneshot;

pub type Responder = oneshot::Sender<Result<(), SharedError>>;
pub type FlushWaiter = oneshot::Sender<()>;

pub struct QueueItem {
    pub record: DocumentRecord,
    pub enqueued_at_ms: i64,
    pub responder: Responder,
}

pub struct WriteQueue {
    items: VecDeque<QueueItem>,
    busy: bool,
    auto_flush: bool,
    max_batch_size: usize,
    flush_waiters: Vec<FlushWaiter>,
}

impl WriteQueue {
    #[must_use]
    pub fn new(max_batch_size: usize, auto_flush: bool) -> Self {
        Self {
            items: VecDeque::new(),
            busy: false,
            auto_flush,
            max_batch_size: max_batch_size.max(1),
            flush_waiters: Vec::new(),
        }
    }

    pub fn push(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[must_use]
    pub fn auto_flush(&self) -> bool {
        self.auto_flush
    }

    pub fn set_auto_flush(&mut self, value: bool) {
        self.auto_flush = value;
    }

    /// Pops a maximal prefix with no repeated storage keys and marks the
    /// queue busy. Returns `None` if already busy or empty.
    pub fn start_drain(&mut self) -> Option<Vec<QueueItem>> {
        if self.busy || self.items.is_empty() {
            return None;
        }
        self.busy = true;

        let mut batch = Vec::new();
        let mut seen = HashSet::new();
        while let Some(item) = self.items.pop_front() {
            let key = item.record.storage_key();
            if seen.contains(&key) {
                self.items.push_front(item);
                break;
            }
            seen.insert(key);
            batch.push(item);
            if batch.len() >= self.max_batch_size {
                break;
            }
        }
        Some(batch)
    }

    /// Clears the busy flag. Returns `true` if another drain should start
    /// immediately because the queue is still non-empty.
    pub fn finish_drain(&mut self) -> bool {
        self.busy = false;
        !self.items.is_empty()
    }

    pub fn register_flush_waiter(&mut self, waiter: FlushWaiter) {
        self.flush_waiters.push(waiter);
    }

    pub fn take_flush_waiters(&mut self) -> Vec<FlushWaiter> {
        std::mem::take(&mut self.flush_waiters)
    }
}


/// Property-based tests for the drain invariant: a single drained batch
/// never contains the same storage key twice.
#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn push_ids(queue: &mut WriteQueue, ids: &[u8]) {
        for &id in ids {
            let (tx, _rx) = oneshot::channel();
            let record = DocumentRecord {
                collection: "docs".into(),
                id: (id % 4).to_string(),
                type_name: None,
                version: Some(1),
                data: None,
                pending_ops: vec![],
                inflight_op: None,
                prevent_compose: false,
                submit_source: false,
            };
            queue.push(QueueItem { record, enqueued_at_ms: 0, responder: tx });
        }
    }

    proptest! {
        #[test]
        fn drained_batch_never_repeats_a_storage_key(ids in prop::collection::vec(0_u8..8, 0..30)) {
            let mut queue = WriteQueue::new(100, true);
            push_ids(&mut queue, &ids);
            if let Some(batch) = queue.start_drain() {
                let mut seen = std::collections::HashSet::new();
                for item in &batch {
                    prop_assert!(seen.insert(item.record.storage_key()));
                }
            }
        }
    }
}
