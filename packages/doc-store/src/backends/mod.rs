//! Concrete [`crate::storage::backend::StorageBackend`] implementations.

pub mod memory;
#[cfg(feature = "redb")]
pub mod redb_backend;

pub use memory::MemoryBackend;
#[cfg(feature = "redb")]
pub use redb_backend::RedbBackend;
