//! The in-memory/persisted index of every document's version and pending flag.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// One inventory row: the version last accepted for a document, and whether
/// it still has unsynced client work pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub v: Option<Version>,
    pub p: bool,
}

/// `collection -> id -> entry`, mirrored between memory and storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    collections: BTreeMap<String, BTreeMap<String, InventoryEntry>>,
}

impl Inventory {
    #[must_use]
    pub fn get(&self, collection: &str, id: &str) -> Option<&InventoryEntry> {
        self.collections.get(collection)?.get(id)
    }

    pub fn set(&mut self, collection: &str, id: &str, entry: InventoryEntry) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), entry);
    }

    pub fn remove(&mut self, collection: &str, id: &str) {
        if let Some(ids) = self.collections.get_mut(collection) {
            ids.remove(id);
            if ids.is_empty() {
                self.collections.remove(collection);
            }
        }
    }

    /// Iterates every `(collection, id, entry)` triple in deterministic order.
    pub fn iter_entries(&self) -> impl Iterator<Item = (&str, &str, &InventoryEntry)> {
        self.collections.iter().flat_map(|(collection, ids)| {
            ids.iter()
                .map(move |(id, entry)| (collection.as_str(), id.as_str(), entry))
        })
    }
}
