//! Blob store abstraction trait
//!
//! This module defines the `BlobStore` trait that all storage backends must
//! implement.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Blob store abstraction
///
/// All backends (S3, local filesystem) must implement this trait. The
/// ingestion engine works against it and never couples to a specific
/// backend.
///
/// **Key format:** see the crate root documentation; keys must not contain
/// `..` or a leading `/`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write an object at the given key. Overwrite semantics are
    /// idempotent: putting the same key twice replaces the object.
    async fn put(&self, storage_key: &str, data: Vec<u8>, content_type: &str)
        -> StorageResult<()>;

    /// Generate a presigned/temporary URL for direct GET access.
    async fn presign(&self, storage_key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Ensure the backing bucket/directory is usable. Idempotent; safe to
    /// call before every upload.
    async fn ensure_bucket(&self) -> StorageResult<()>;

    /// Delete an object by key.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;
}
