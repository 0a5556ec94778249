//! Fan-out observer for coordinator lifecycle and persistence events.

use std::sync::Arc;

use doc_core::{DocumentRecord, SharedError};

pub trait CoordinatorObserver: Send + Sync {
    fn on_ready(&self);
    fn on_before_persist(&self, docs: &[DocumentRecord]);
    fn on_persist(&self, docs: &[DocumentRecord]);
    fn on_no_persist_pending(&self);
    fn on_error(&self, error: &SharedError);
}

#[derive(Default)]
pub struct CompositeCoordinatorObserver {
    observers: Vec<Arc<dyn CoordinatorObserver>>,
}

impl CompositeCoordinatorObserver {
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn CoordinatorObserver>>) -> Self {
        Self { observers }
    }

    pub fn add(&mut self, observer: Arc<dyn CoordinatorObserver>) {
        self.observers.push(observer);
    }
}

impl CoordinatorObserver for CompositeCoordinatorObserver {
    fn on_ready(&self) {
        for observer in &self.observers {
            observer.on_ready();
        }
    }

    fn on_before_persist(&self, docs: &[DocumentRecord]) {
        for observer in &self.observers {
            observer.on_before_persist(docs);
        }
    }

    fn on_persist(&self, docs: &[DocumentRecord]) {
        for observer in &self.observers {
            observer.on_persist(docs);
        }
    }

    fn on_no_persist_pending(&self) {
        for observer in &self.observers {
            observer.on_no_persist_pending();
        }
    }

    fn on_error(&self, error: &SharedError) {
        for observer in &self.observers {
            observer.on_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use doc_core::StoreError;

    use super::*;

    #[derive(Default)]
    struct CountingObserver {
        ready: AtomicUsize,
        before_persist: AtomicUsize,
        persist: AtomicUsize,
        no_pending: AtomicUsize,
        errors: AtomicUsize,
    }

    impl CoordinatorObserver for CountingObserver {
        fn on_ready(&self) {
            self.ready.fetch_add(1, Ordering::SeqCst);
        }
        fn on_before_persist(&self, _docs: &[DocumentRecord]) {
            self.before_persist.fetch_add(1, Ordering::SeqCst);
        }
        fn on_persist(&self, _docs: &[DocumentRecord]) {
            self.persist.fetch_add(1, Ordering::SeqCst);
        }
        fn on_no_persist_pending(&self) {
            self.no_pending.fetch_add(1, Ordering::SeqCst);
        }
        fn on_error(&self, _error: &SharedError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn _assert_object_safe(_o: &Arc<dyn CoordinatorObserver>) {}

    #[test]
    fn composite_fans_out_to_every_observer() {
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());
        let composite = CompositeCoordinatorObserver::new(vec![
            a.clone() as Arc<dyn CoordinatorObserver>,
            b.clone() as Arc<dyn CoordinatorObserver>,
        ]);

        composite.on_ready();
        composite.on_before_persist(&[]);
        composite.on_persist(&[]);
        composite.on_no_persist_pending();
        composite.on_error(&Arc::new(StoreError::NotReady));

        for observer in [&a, &b] {
            assert_eq!(observer.ready.load(Ordering::SeqCst), 1);
            assert_eq!(observer.before_persist.load(Ordering::SeqCst), 1);
            assert_eq!(observer.persist.load(Ordering::SeqCst), 1);
            assert_eq!(observer.no_pending.load(Ordering::SeqCst), 1);
            assert_eq!(observer.errors.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn add_extends_fan_out_after_construction() {
        let composite_observer = Arc::new(CountingObserver::default());
        let mut composite = CompositeCoordinatorObserver::default();
        composite.add(composite_observer.clone());
        composite.on_ready();
        assert_eq!(composite_observer.ready.load(Ordering::SeqCst), 1);
    }
}
