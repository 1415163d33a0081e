//! Content fingerprinting and pre-storage inspection.

use coursevault_core::validation::{derive_extension, sanitize_filename};
use coursevault_core::AppError;
use sha2::{Digest, Sha256};

/// Everything the pipeline needs to know about an upload's bytes before any
/// storage or database write: sanitized filename, canonical extension, hex
/// SHA-256 fingerprint and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    pub filename: String,
    pub extension: String,
    pub content_type: String,
    pub content_hash: String,
    pub size: usize,
}

impl ContentDescriptor {
    /// Inspect one upload. Fails on unmapped media types and unsafe
    /// filenames so rejected uploads never touch the blob store.
    pub fn inspect(filename: &str, content_type: &str, data: &[u8]) -> Result<Self, AppError> {
        let extension = derive_extension(content_type)?;
        let filename = sanitize_filename(filename)?;

        let mut hasher = Sha256::new();
        hasher.update(data);
        let content_hash = hex::encode(hasher.finalize());

        Ok(ContentDescriptor {
            filename,
            extension,
            content_type: content_type.to_string(),
            content_hash,
            size: data.len(),
        })
    }
}
