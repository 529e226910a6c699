//! Resumable-upload blob storage: fetch the bytes a client's tus session
//! left in object storage once the upload is complete.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use object_store::{path::Path as ObjectPath, ObjectStore};
use std::sync::Arc;

/// Narrow seam over blob storage: the core only ever reads a committed
/// object back by key, never lists or writes directly (the client uploads
/// through its own tus session).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Wraps an `object_store`-backed bucket (S3-compatible in production).
pub struct ObjectStoreBlob {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBlob {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlob {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = ObjectPath::from(key);
        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| AppError::Internal(format!("blob fetch failed for {key}: {e}")))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| AppError::Internal(format!("blob read failed for {key}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Decode a fetched blob as UTF-8, lossily: resumable uploads carry
/// arbitrary client bytes that must still proceed through the text
/// ingestion path, so a decode failure should never abort `commit_tus`.
pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
