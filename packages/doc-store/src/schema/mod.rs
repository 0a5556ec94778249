//! Schema strategies: how documents and the inventory are laid out in a
//! storage backend's named stores.

pub mod collection_table;
pub mod single_table;
pub mod strategy;

pub use collection_table::{CollectionPerTableSchema, CollectionTableConfig};
pub use single_table::SingleTableSchema;
pub use strategy::{InventoryKind, SchemaStrategy};
