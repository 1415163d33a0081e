//! SQLx repository implementations of the pipeline persistence traits.

use async_trait::async_trait;
use coursevault_core::models::{
    CourseFileAggregate, DynamicFileEntry, DynamicKind, ExamComponent, ExamRecord, ExamType,
    FileSlotValue, FixedFileType, Template,
};
use coursevault_core::AppError;
use coursevault_db::{
    CourseFileRepository, CourseRepository, ExamRepository, TemplateRepository,
    TemplateUsageRepository,
};
use uuid::Uuid;

use crate::upload::traits::{ArchiveStore, CourseStore, ExamStore, TemplateStore};

#[async_trait]
impl CourseStore for CourseRepository {
    async fn course_exists(&self, course_id: Uuid) -> Result<bool, AppError> {
        self.exists(course_id).await
    }
}

#[async_trait]
impl ArchiveStore for CourseFileRepository {
    async fn find(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
    ) -> Result<Option<CourseFileAggregate>, AppError> {
        CourseFileRepository::find(self, course_id, submitter_id).await
    }

    async fn find_or_create(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
    ) -> Result<CourseFileAggregate, AppError> {
        CourseFileRepository::find_or_create(self, course_id, submitter_id).await
    }

    async fn upsert_fixed_slot(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        file_type: FixedFileType,
        value: &FileSlotValue,
    ) -> Result<CourseFileAggregate, AppError> {
        CourseFileRepository::upsert_fixed_slot(self, course_id, submitter_id, file_type, value)
            .await
    }

    async fn create_with_dynamic_list(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        kind: DynamicKind,
        list: &[DynamicFileEntry],
    ) -> Result<Option<CourseFileAggregate>, AppError> {
        CourseFileRepository::create_with_dynamic_list(self, course_id, submitter_id, kind, list)
            .await
    }

    async fn update_dynamic_list(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        kind: DynamicKind,
        list: &[DynamicFileEntry],
        expected_revision: i64,
    ) -> Result<Option<CourseFileAggregate>, AppError> {
        CourseFileRepository::update_dynamic_list(
            self,
            course_id,
            submitter_id,
            kind,
            list,
            expected_revision,
        )
        .await
    }
}

#[async_trait]
impl ExamStore for ExamRepository {
    async fn find_exam(
        &self,
        course_files_id: Uuid,
        exam_number: i32,
    ) -> Result<Option<ExamRecord>, AppError> {
        self.find(course_files_id, exam_number).await
    }

    async fn upsert_component(
        &self,
        course_files_id: Uuid,
        exam_type: ExamType,
        exam_number: i32,
        component: ExamComponent,
        value: &FileSlotValue,
    ) -> Result<ExamRecord, AppError> {
        ExamRepository::upsert_component(
            self,
            course_files_id,
            exam_type,
            exam_number,
            component,
            value,
        )
        .await
    }

    async fn recompute_completed(
        &self,
        course_files_id: Uuid,
        exam_number: i32,
    ) -> Result<ExamRecord, AppError> {
        ExamRepository::recompute_completed(self, course_files_id, exam_number).await
    }
}

/// Template lookups and the usage audit trail live in two repositories; this
/// adapter pairs them behind one seam.
#[derive(Clone)]
pub struct TemplateStores {
    pub templates: TemplateRepository,
    pub usages: TemplateUsageRepository,
}

#[async_trait]
impl TemplateStore for TemplateStores {
    async fn get_template(&self, template_id: Uuid) -> Result<Option<Template>, AppError> {
        self.templates.get(template_id).await
    }

    async fn record_usage(
        &self,
        template_id: Uuid,
        course_id: Uuid,
        submitter_id: Uuid,
        file_id: Uuid,
    ) -> Result<(), AppError> {
        self.usages
            .record(template_id, course_id, submitter_id, file_id)
            .await
            .map(|_| ())
    }
}
