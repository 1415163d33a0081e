//! Storage backend identifiers shared between core and storage crates.

use serde::{Deserialize, Serialize};

/// Supported blob storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

impl StorageBackend {
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "s3" => Some(StorageBackend::S3),
            "local" => Some(StorageBackend::Local),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!(StorageBackend::from_str_opt("S3"), Some(StorageBackend::S3));
        assert_eq!(
            StorageBackend::from_str_opt("local"),
            Some(StorageBackend::Local)
        );
        assert_eq!(StorageBackend::from_str_opt("nfs"), None);
    }
}
