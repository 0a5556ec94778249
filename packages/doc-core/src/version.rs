//! Version values and the comparison policy applied across inventory membership
//! checks and write validation.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A version as recorded in the inventory: either the document's own integer
/// version or whatever an external version decoder produced from its data.
///
/// Numbers and strings are never comparable to each other; mixing them for
/// the same collection/id is a [`crate::error::StoreError::VersionTypeMismatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Version {
    Number(i64),
    Text(String),
}

impl Version {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Version::Number(_) => "number",
            Version::Text(_) => "string",
        }
    }

    /// Compares two versions of the same kind. Returns `None` when the kinds
    /// differ, signalling a type mismatch rather than an ordering.
    #[must_use]
    pub fn compare(&self, other: &Version) -> Option<Ordering> {
        match (self, other) {
            (Version::Number(a), Version::Number(b)) => Some(a.cmp(b)),
            (Version::Text(a), Version::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Decodes a version out of a document's `data` tree. Returns `None` when the
/// version should be recorded as null (including when `data` itself is absent,
/// which the coordinator short-circuits without invoking this).
pub type VersionDecoder =
    Arc<dyn Fn(Option<&serde_json::Value>) -> Option<Version> + Send + Sync>;
