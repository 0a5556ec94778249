//! Shared bulk-read fallback used by every schema strategy: prefer the
//! backend's native bulk read, else issue one read per id.

use doc_core::StoreResult;

use super::backend::{StorageBackend, StoredRecord};

pub async fn read_bulk_or_fallback(
    backend: &dyn StorageBackend,
    store: &str,
    ids: &[String],
) -> StoreResult<Vec<StoredRecord>> {
    if let Some(found) = backend.read_records_bulk(store, ids).await? {
        return Ok(found);
    }

    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(payload) = backend.read_record(store, id).await? {
            out.push(StoredRecord { id: id.clone(), payload });
        }
    }
    Ok(out)
}
