//! Database repositories for the archive engine
//!
//! Each repository is responsible for one domain entity and provides the
//! operations the ingestion engine needs. Queries are dynamic (unchecked)
//! SQLx queries so the crate builds without a live DATABASE_URL.

pub mod course_files;
pub mod courses;
pub mod exams;
pub mod template_usage;
pub mod templates;

pub use course_files::CourseFileRepository;
pub use courses::CourseRepository;
pub use exams::ExamRepository;
pub use template_usage::TemplateUsageRepository;
pub use templates::{TemplateDraft, TemplateRepository};
