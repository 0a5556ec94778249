//! Durable representations of an operational-transform document and its ops.
//!
//! `DocumentRecord` is the shape written to and read from storage. `DocSnapshot`
//! is what a caller hands the coordinator when it wants a document persisted --
//! an owned, deep-copied view of the live document at the moment of the call.

use serde::{Deserialize, Serialize};

/// A single queued or in-flight operation as carried by a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpRecord {
    pub op: serde_json::Value,
    pub src: Option<String>,
    pub seq: i64,
    pub v: i64,
    pub source: bool,
}

/// Durable form of a document: everything the store needs to reconstruct a
/// live document without re-running its OT history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub collection: String,
    pub id: String,
    pub type_name: Option<String>,
    pub version: Option<i64>,
    pub data: Option<serde_json::Value>,
    pub pending_ops: Vec<OpRecord>,
    pub inflight_op: Option<OpRecord>,
    pub prevent_compose: bool,
    pub submit_source: bool,
}

impl DocumentRecord {
    /// The key a single-table schema strategy stores this record under.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    /// Whether this document still has work a client is waiting on -- used to
    /// compute the inventory's `p` (pending) flag.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.inflight_op.is_some() || !self.pending_ops.is_empty()
    }
}

/// Owned snapshot of a live document, as handed to `putDoc`/`putDocsBulk`.
/// `connection_id` backs the invariant that a persisted inflight op's `src`
/// is never left null: if the op doesn't already carry one, the coordinator
/// substitutes this before the record is built.
#[derive(Debug, Clone)]
pub struct DocSnapshot {
    pub collection: String,
    pub id: String,
    pub type_name: Option<String>,
    pub version: Option<i64>,
    pub data: Option<serde_json::Value>,
    pub pending_ops: Vec<OpRecord>,
    pub inflight_op: Option<OpRecord>,
    pub prevent_compose: bool,
    pub submit_source: bool,
    pub connection_id: Option<String>,
}

impl From<DocSnapshot> for DocumentRecord {
    fn from(snapshot: DocSnapshot) -> Self {
        Self {
            collection: snapshot.collection,
            id: snapshot.id,
            type_name: snapshot.type_name,
            version: snapshot.version,
            data: snapshot.data,
            pending_ops: snapshot.pending_ops,
            inflight_op: snapshot.inflight_op,
            prevent_compose: snapshot.prevent_compose,
            submit_source: snapshot.submit_source,
        }
    }
}
