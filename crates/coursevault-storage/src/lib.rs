//! Coursevault Storage Library
//!
//! Blob-store abstraction and implementations for the archive engine.
//! Includes the `BlobStore` trait plus S3 (via `object_store`) and local
//! filesystem backends.
//!
//! # Storage key format
//!
//! Keys are slash-delimited and derived from the slot being written:
//!
//! - **Fixed slot**: `{course_id}/{fixed_type}/{filename}`
//! - **Dynamic slot**: `{course_id}/{kind}/{name}/{filename}`
//! - **Exam component**: `{course_id}/exams/{exam_type}/{exam_number}/{component}/{filename}`
//!
//! Keys are deterministic but not content-addressed: re-uploading under the
//! same filename overwrites the object in place. Key generation is
//! centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use coursevault_core::StorageBackend;
pub use factory::create_blob_store;
pub use keys::slot_storage_key;
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3BlobStore;
pub use traits::{BlobStore, StorageError, StorageResult};
