//! Coursevault Core Library
//!
//! This crate provides the domain models, slot taxonomy, error types,
//! configuration, and upload validation rules shared across all
//! Coursevault components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::ArchiveConfig;
pub use error::AppError;
pub use storage_types::StorageBackend;
