//! Shared constants for the archive engine.

/// Default bucket for course file objects when none is configured.
pub const DEFAULT_BUCKET: &str = "course-files";

/// TTL for presigned access URLs issued on upload (24 hours).
pub const PRESIGN_TTL_SECS: u64 = 24 * 60 * 60;

/// Maximum size for fixed-slot uploads (built-in policy).
pub const FIXED_MAX_SIZE_BYTES: i64 = 10 * 1024 * 1024;

/// Extensions accepted by the built-in fixed-slot policy.
pub const FIXED_ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

/// How many times a dynamic-list compare-and-swap is retried on revision
/// mismatch before the upload fails with a conflict.
pub const DYNAMIC_LIST_CAS_ATTEMPTS: u32 = 3;
