//! Narrow traits the coordinator calls through but never implements itself.
//!
//! Both are external collaborators: the live OT document type and its type
//! registry live entirely outside this crate's scope.

use crate::error::OpErrorCallback;
use crate::record::OpRecord;

/// Looks up OT types by name. The coordinator consults this only to resolve
/// a document's `type_name` during restore; it never runs a type's algorithm.
pub trait OtTypeRegistry: Send + Sync {
    fn has_type(&self, name: &str) -> bool;
}

/// The surface of a live document the coordinator needs to repopulate it from
/// a durable record. Deliberately narrow: it does not expose edit/event APIs,
/// only the fields a restore has to set.
pub trait RestorableDoc {
    fn collection(&self) -> &str;
    fn id(&self) -> &str;
    fn set_version(&mut self, version: Option<i64>);
    fn set_data(&mut self, data: Option<serde_json::Value>);
    fn set_type(&mut self, type_name: Option<String>, registry: &dyn OtTypeRegistry);
    fn set_prevent_compose(&mut self, value: bool);
    fn set_submit_source(&mut self, value: bool);
    fn set_pending_ops(&mut self, ops: Vec<OpRecord>);
    fn attach_op_error_callback(&mut self, callback: OpErrorCallback);
    fn emit_restore(&mut self);
}
