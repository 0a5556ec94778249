//! The storage layer: a backend-agnostic atomic byte-blob contract
//! ([`backend`]) plus a shared bulk-read fallback helper ([`bulk`]) built on
//! top of it.

pub mod backend;
pub mod bulk;

pub use backend::{StorageBackend, StoredRecord, WriteBatch};
pub use bulk::read_bulk_or_fallback;
