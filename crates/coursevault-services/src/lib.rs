//! Coursevault ingestion services
//!
//! Orchestrates the upload pipeline: classify the target slot, fingerprint
//! and validate the content, write the blob, then patch the owning record
//! field-by-field. Storage and persistence are reached through traits so the
//! pipeline itself stays backend-agnostic.

pub mod store_impls;
pub mod upload;

pub use upload::service::IngestionService;
pub use upload::traits::{ArchiveStore, CourseStore, ExamStore, TemplateStore};
pub use upload::types::{
    ExamComponentUpload, ExamSetUpload, ExamUploadOutcome, ExamUploadRequest, ExamUploadResponse,
    UploadOutcome, UploadRequest, UploadResponse,
};
