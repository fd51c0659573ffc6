//! Object storage for uploaded documents.

mod minio;
pub(crate) mod sigv4;

pub use minio::MinioStore;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Errors returned while interacting with the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Endpoint URL failed to parse or has no host.
    #[error("Invalid storage endpoint: {0}")]
    InvalidEndpoint(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The store responded with an unexpected status code.
    #[error("Unexpected storage response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Metadata describing a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key within the bucket (the file id).
    pub key: String,
    /// Size in bytes, when reported by the store.
    pub size: Option<u64>,
    /// Content type recorded at upload time.
    pub content_type: Option<String>,
    /// Entity tag reported by the store, without quotes.
    pub etag: Option<String>,
}

/// Bucket-scoped object storage used by the upload and OCR flows.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket holding uploads.
    fn bucket(&self) -> &str;

    /// Create the bucket when it does not exist yet.
    async fn ensure_bucket(&self) -> Result<(), StorageError>;

    /// Store `data` under `key`.
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Look up an object, returning `None` when it does not exist.
    async fn stat_object(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError>;

    /// Issue a time-limited download URL for `key`.
    fn presigned_get_url(&self, key: &str, ttl: Duration) -> String;
}
