//! Validation modules

pub mod upload;

pub use upload::{
    builtin_policy, derive_extension, sanitize_filename, validate_against_policy, UploadPolicy,
};
