//! Record codec: MessagePack framing over [`doc_core::DocumentRecord`], with
//! an optional pluggable encryption transform applied as an opaque byte-to-byte
//! step, and field-level variants for schema strategies that persist documents
//! as extracted columns instead of one opaque blob.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use doc_core::{DocumentRecord, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Transforms opaque bytes for at-rest encryption. Implementations know
/// nothing about the record shape; the codec hands them whole serialized
/// blobs or individual field values, never structured data.
pub trait EncryptionTransform: Send + Sync {
    fn encrypt(&self, bytes: &[u8]) -> StoreResult<Vec<u8>>;
    fn decrypt(&self, bytes: &[u8]) -> StoreResult<Vec<u8>>;
}

#[derive(Serialize, Deserialize)]
enum Envelope {
    Plain(DocumentRecord),
    Encrypted(ByteBuf),
}

pub struct RecordCodec {
    encryption: Option<Arc<dyn EncryptionTransform>>,
}

impl RecordCodec {
    #[must_use]
    pub fn new(encryption: Option<Arc<dyn EncryptionTransform>>) -> Self {
        Self { encryption }
    }

    #[must_use]
    pub fn plain() -> Self {
        Self::new(None)
    }

    /// Encodes a whole document as one opaque blob -- the single-table layout.
    pub fn encode_doc(&self, doc: &DocumentRecord) -> StoreResult<Vec<u8>> {
        let envelope = match &self.encryption {
            None => Envelope::Plain(doc.clone()),
            Some(transform) => {
                let plain = rmp_serde::to_vec(doc).map_err(|e| StoreError::Other(e.into()))?;
                let ciphertext = transform.encrypt(&plain)?;
                Envelope::Encrypted(ByteBuf::from(ciphertext))
            }
        };
        rmp_serde::to_vec(&envelope).map_err(|e| StoreError::Other(e.into()))
    }

    pub fn decode_doc(&self, bytes: &[u8]) -> StoreResult<DocumentRecord> {
        let envelope: Envelope =
            rmp_serde::from_slice(bytes).map_err(|e| StoreError::DecodeFailure(e.into()))?;
        match envelope {
            Envelope::Plain(doc) => Ok(doc),
            Envelope::Encrypted(ciphertext) => {
                let transform = self.encryption.as_ref().ok_or_else(|| {
                    StoreError::DecodeFailure(anyhow::anyhow!(
                        "record is encrypted but no decryption transform is configured"
                    ))
                })?;
                let plain = transform.decrypt(&ciphertext)?;
                rmp_serde::from_slice(&plain).map_err(|e| StoreError::DecodeFailure(e.into()))
            }
        }
    }

    /// Encrypts a single JSON field value, used by the collection-per-table
    /// strategy for its declared encrypted fields. Wraps the ciphertext in a
    /// tagged object so `decrypt_field` can recognize it on read.
    pub fn encrypt_field(&self, value: &serde_json::Value) -> StoreResult<serde_json::Value> {
        let Some(transform) = &self.encryption else {
            return Ok(value.clone());
        };
        let plain = serde_json::to_vec(value).map_err(|e| StoreError::Other(e.into()))?;
        let ciphertext = transform.encrypt(&plain)?;
        Ok(serde_json::json!({ "$enc": BASE64.encode(ciphertext) }))
    }

    pub fn decrypt_field(&self, value: &serde_json::Value) -> StoreResult<serde_json::Value> {
        let Some(encoded) = value.get("$enc").and_then(serde_json::Value::as_str) else {
            return Ok(value.clone());
        };
        let transform = self.encryption.as_ref().ok_or_else(|| {
            StoreError::DecodeFailure(anyhow::anyhow!(
                "field is encrypted but no decryption transform is configured"
            ))
        })?;
        let ciphertext = BASE64
            .decode(encoded)
            .map_err(|e| StoreError::DecodeFailure(e.into()))?;
        let plain = transform.decrypt(&ciphertext)?;
        serde_json::from_slice(&plain).map_err(|e| StoreError::DecodeFailure(e.into()))
    }
}
