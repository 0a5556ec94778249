//! Error taxonomy for the durable persistence layer.

use std::sync::Arc;

use thiserror::Error;

use crate::version::Version;

/// The seven error kinds surfaced by the coordinator, plus a transparent
/// catch-all for whatever a storage backend throws that doesn't otherwise fit.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("operation invoked before initialize() completed")]
    NotReady,

    #[error("coordinator constructed without a storage backend")]
    MissingStorage,

    #[error(
        "version regression for {collection}/{id}: stored {stored:?}, attempted {attempted:?}"
    )]
    VersionRegression {
        collection: String,
        id: String,
        stored: Option<Version>,
        attempted: Version,
    },

    #[error(
        "version type mismatch for {collection}/{id}: stored kind {stored_kind}, attempted kind {attempted_kind}"
    )]
    VersionTypeMismatch {
        collection: String,
        id: String,
        stored_kind: &'static str,
        attempted_kind: &'static str,
    },

    #[error("storage backend failure: {0}")]
    BackendFailure(#[source] anyhow::Error),

    #[error("failed to decode a persisted record: {0}")]
    DecodeFailure(#[source] anyhow::Error),

    #[error("operation conflict: {0}")]
    OpConflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias for single-call operations (reads, lifecycle calls).
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors delivered through a batch fan out to more than one waiter, so they
/// need to be cheaply cloneable; `anyhow::Error` is not, hence the `Arc`.
pub type SharedError = Arc<StoreError>;

/// Invoked once per restored pending/inflight op so a live document can route
/// eventual submission failures back the same way it would for an op it
/// created itself.
pub type OpErrorCallback = Arc<dyn Fn(&StoreError) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_regression_message_includes_identity() {
        let err = StoreError::VersionRegression {
            collection: "docs".into(),
            id: "a1".into(),
            stored: Some(Version::Number(3)),
            attempted: Version::Number(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("docs/a1"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn other_wraps_anyhow_transparently() {
        let cause = anyhow::anyhow!("boom");
        let err: StoreError = cause.into();
        assert!(err.to_string().contains("boom"));
    }
}
