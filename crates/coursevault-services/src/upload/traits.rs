//! Persistence seams for the upload pipeline.
//!
//! The ingestion service talks to these traits rather than to SQLx directly,
//! so tests can run against in-memory stores and the repositories stay free
//! of pipeline logic.

use async_trait::async_trait;
use coursevault_core::models::{
    CourseFileAggregate, DynamicFileEntry, DynamicKind, ExamComponent, ExamRecord, ExamType,
    FileSlotValue, FixedFileType, Template,
};
use coursevault_core::AppError;
use uuid::Uuid;

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn course_exists(&self, course_id: Uuid) -> Result<bool, AppError>;
}

/// Access to the per-(course, submitter) aggregate document.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn find(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
    ) -> Result<Option<CourseFileAggregate>, AppError>;

    async fn find_or_create(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
    ) -> Result<CourseFileAggregate, AppError>;

    async fn upsert_fixed_slot(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        file_type: FixedFileType,
        value: &FileSlotValue,
    ) -> Result<CourseFileAggregate, AppError>;

    /// Create a fresh aggregate seeded with one dynamic list; `None` when the
    /// aggregate already exists and the caller should take the update path.
    async fn create_with_dynamic_list(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        kind: DynamicKind,
        list: &[DynamicFileEntry],
    ) -> Result<Option<CourseFileAggregate>, AppError>;

    /// Replace a dynamic list when the aggregate revision still matches;
    /// `None` signals a lost race and the caller re-reads and retries.
    async fn update_dynamic_list(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        kind: DynamicKind,
        list: &[DynamicFileEntry],
        expected_revision: i64,
    ) -> Result<Option<CourseFileAggregate>, AppError>;
}

#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn find_exam(
        &self,
        course_files_id: Uuid,
        exam_number: i32,
    ) -> Result<Option<ExamRecord>, AppError>;

    async fn upsert_component(
        &self,
        course_files_id: Uuid,
        exam_type: ExamType,
        exam_number: i32,
        component: ExamComponent,
        value: &FileSlotValue,
    ) -> Result<ExamRecord, AppError>;

    async fn recompute_completed(
        &self,
        course_files_id: Uuid,
        exam_number: i32,
    ) -> Result<ExamRecord, AppError>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, template_id: Uuid) -> Result<Option<Template>, AppError>;

    async fn record_usage(
        &self,
        template_id: Uuid,
        course_id: Uuid,
        submitter_id: Uuid,
        file_id: Uuid,
    ) -> Result<(), AppError>;
}
