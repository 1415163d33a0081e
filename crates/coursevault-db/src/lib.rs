//! Coursevault database layer
//!
//! Sqlx/Postgres repositories for course file aggregates, exam records,
//! templates, and the template-usage audit trail.

pub mod db;

pub use db::{
    CourseFileRepository, CourseRepository, ExamRepository, TemplateDraft, TemplateRepository,
    TemplateUsageRepository,
};
