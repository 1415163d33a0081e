//! Upload pipeline orchestrator.
//!
//! The pipeline runs in a fixed order: classify the slot, check the course,
//! inspect and validate the content, write the blob, presign it, then patch
//! the owning record. Validation failures happen before any storage or
//! database write; a blob that was written but whose record patch fails is
//! orphaned and harmless (the next upload to the slot overwrites it).

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use coursevault_core::constants::DYNAMIC_LIST_CAS_ATTEMPTS;
use coursevault_core::models::{
    merge_dynamic_entry, DynamicKind, ExamSetResult, FileSlotValue, FixedFileType, SlotDescriptor,
    SlotTarget,
};
use coursevault_core::validation::{builtin_policy, validate_against_policy, UploadPolicy};
use coursevault_core::AppError;
use coursevault_storage::{slot_storage_key, BlobStore, StorageError};
use tracing::{info, warn};
use uuid::Uuid;

use super::content::ContentDescriptor;
use super::traits::{ArchiveStore, CourseStore, ExamStore, TemplateStore};
use super::types::{
    ExamUploadOutcome, ExamUploadRequest, UploadOutcome, UploadRequest,
};

fn storage_err(e: StorageError) -> AppError {
    AppError::Storage(e.to_string())
}

/// Archive ingestion service: validates, stores and records uploads.
pub struct IngestionService {
    blob_store: Arc<dyn BlobStore>,
    archive: Arc<dyn ArchiveStore>,
    exams: Arc<dyn ExamStore>,
    templates: Arc<dyn TemplateStore>,
    courses: Arc<dyn CourseStore>,
    presign_ttl: Duration,
}

impl IngestionService {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        archive: Arc<dyn ArchiveStore>,
        exams: Arc<dyn ExamStore>,
        templates: Arc<dyn TemplateStore>,
        courses: Arc<dyn CourseStore>,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            blob_store,
            archive,
            exams,
            templates,
            courses,
            presign_ttl,
        }
    }

    /// Upload one file into a fixed-purpose slot.
    pub async fn upload_fixed(
        &self,
        request: UploadRequest,
        file_type: FixedFileType,
    ) -> Result<UploadOutcome, AppError> {
        self.upload_slot(request, SlotDescriptor::Fixed { file_type })
            .await
    }

    /// Upload one file into a named dynamic slot, optionally governed by an
    /// explicit template.
    pub async fn upload_dynamic(
        &self,
        request: UploadRequest,
        name: String,
        kind: DynamicKind,
        template_id: Option<Uuid>,
    ) -> Result<UploadOutcome, AppError> {
        self.upload_slot(
            request,
            SlotDescriptor::Dynamic {
                name,
                kind,
                template_id,
            },
        )
        .await
    }

    /// Upload one file into a fixed or dynamic slot.
    #[tracing::instrument(skip(self, request, descriptor), fields(course_id = %request.course_id, submitter_id = %request.submitter_id))]
    pub async fn upload_slot(
        &self,
        request: UploadRequest,
        descriptor: SlotDescriptor,
    ) -> Result<UploadOutcome, AppError> {
        let start = Instant::now();
        let target = SlotTarget::classify(request.course_id, request.submitter_id, descriptor)?;

        if matches!(target.descriptor, SlotDescriptor::ExamComponent { .. }) {
            return Err(AppError::InvalidInput(
                "Exam components are uploaded through the exam set endpoint".to_string(),
            ));
        }

        self.require_course(target.course_id).await?;

        let content =
            ContentDescriptor::inspect(&request.filename, &request.content_type, &request.data)?;
        let policy = self.resolve_policy(&target).await?;
        validate_against_policy(&policy, &content.extension, content.size)?;

        let storage_key = slot_storage_key(target.course_id, &target.descriptor, &content.filename);
        let object_url = self
            .store_and_presign(&storage_key, request.data, &content.content_type)
            .await?;

        let outcome = match &target.descriptor {
            SlotDescriptor::Fixed { file_type } => {
                self.record_fixed(&target, *file_type, object_url, &content, request.comments)
                    .await?
            }
            SlotDescriptor::Dynamic { name, kind, .. } => {
                self.record_dynamic(
                    &target,
                    name,
                    *kind,
                    object_url,
                    &content,
                    request.comments,
                )
                .await?
            }
            SlotDescriptor::ExamComponent { .. } => unreachable!(),
        };

        if let Some(template_id) = target.template_id() {
            self.audit_template_usage(template_id, &target, outcome.file_id)
                .await;
        }

        info!(
            storage_key = %storage_key,
            content_hash = %outcome.content_hash,
            version = outcome.version,
            size_bytes = content.size,
            duration_ms = start.elapsed().as_millis() as u64,
            "Slot upload complete"
        );

        Ok(outcome)
    }

    /// Upload a batch of exam artifacts grouped by set number. Every file is
    /// validated before any of them is stored, so a bad file fails the whole
    /// request without side effects.
    #[tracing::instrument(skip(self, request), fields(course_id = %request.course_id, submitter_id = %request.submitter_id, exam_type = %request.exam_type.as_str()))]
    pub async fn upload_exam_set(
        &self,
        request: ExamUploadRequest,
    ) -> Result<ExamUploadOutcome, AppError> {
        let start = Instant::now();
        let total_files: usize = request.sets.iter().map(|s| s.files.len()).sum();
        if total_files == 0 {
            return Err(AppError::NoFilesProvided);
        }

        // Classify every component first so malformed set numbers reject the
        // batch before any I/O.
        let mut planned = Vec::with_capacity(total_files);
        for set in &request.sets {
            for file in &set.files {
                let target = SlotTarget::classify(
                    request.course_id,
                    request.submitter_id,
                    SlotDescriptor::ExamComponent {
                        exam_type: request.exam_type,
                        exam_number: set.exam_number,
                        component: file.component,
                    },
                )?;
                let content =
                    ContentDescriptor::inspect(&file.filename, &file.content_type, &file.data)?;
                let policy = builtin_policy();
                validate_against_policy(&policy, &content.extension, content.size)?;
                planned.push((target, content, file.data.clone(), set.exam_number));
            }
        }

        self.require_course(request.course_id).await?;
        let aggregate = self
            .archive
            .find_or_create(request.course_id, request.submitter_id)
            .await?;

        let mut touched_sets: Vec<i32> = Vec::new();
        for (target, content, data, exam_number) in planned {
            let storage_key =
                slot_storage_key(target.course_id, &target.descriptor, &content.filename);
            let object_url = self
                .store_and_presign(&storage_key, data, &content.content_type)
                .await?;

            let component = match target.descriptor {
                SlotDescriptor::ExamComponent { component, .. } => component,
                _ => unreachable!(),
            };

            let prior = self
                .exams
                .find_exam(aggregate.id, exam_number)
                .await?
                .and_then(|rec| rec.component(component).cloned());
            let value = FileSlotValue::next(
                prior.as_ref(),
                object_url,
                content.content_hash.clone(),
                request.comments.clone(),
                Utc::now(),
            );

            self.exams
                .upsert_component(
                    aggregate.id,
                    request.exam_type,
                    exam_number,
                    component,
                    &value,
                )
                .await?;

            if !touched_sets.contains(&exam_number) {
                touched_sets.push(exam_number);
            }
        }

        let mut sets = Vec::with_capacity(touched_sets.len());
        for exam_number in touched_sets {
            let record = self
                .exams
                .recompute_completed(aggregate.id, exam_number)
                .await?;
            sets.push(ExamSetResult {
                exam_id: record.id,
                exam_number: record.exam_number,
                uploaded_files: record.uploaded_components(),
                pending_files: record.pending_components(),
                is_complete: record.is_completed,
            });
        }

        info!(
            file_count = total_files,
            set_count = sets.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Exam set upload complete"
        );

        Ok(ExamUploadOutcome {
            file_id: aggregate.id,
            sets,
        })
    }

    async fn require_course(&self, course_id: Uuid) -> Result<(), AppError> {
        if !self.courses.course_exists(course_id).await? {
            return Err(AppError::NotFound(format!(
                "Course {} not found",
                course_id
            )));
        }
        Ok(())
    }

    /// Effective policy for a slot: its explicit template when one is
    /// referenced, otherwise the built-in document policy.
    async fn resolve_policy(&self, target: &SlotTarget) -> Result<UploadPolicy, AppError> {
        match target.template_id() {
            Some(template_id) => {
                let template = self
                    .templates
                    .get_template(template_id)
                    .await?
                    .ok_or_else(|| AppError::TemplateNotFound(template_id.to_string()))?;
                UploadPolicy::from_template(&template)
            }
            None => Ok(builtin_policy()),
        }
    }

    /// Write the blob (retrying a failed put once) and presign it.
    async fn store_and_presign(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        self.blob_store.ensure_bucket().await.map_err(storage_err)?;

        if let Err(first) = self
            .blob_store
            .put(storage_key, data.clone(), content_type)
            .await
        {
            warn!(storage_key = %storage_key, error = %first, "Blob put failed, retrying once");
            self.blob_store
                .put(storage_key, data, content_type)
                .await
                .map_err(storage_err)?;
        }

        self.blob_store
            .presign(storage_key, self.presign_ttl)
            .await
            .map_err(storage_err)
    }

    async fn record_fixed(
        &self,
        target: &SlotTarget,
        file_type: FixedFileType,
        object_url: String,
        content: &ContentDescriptor,
        comments: Option<String>,
    ) -> Result<UploadOutcome, AppError> {
        let prior = self
            .archive
            .find(target.course_id, target.submitter_id)
            .await?
            .and_then(|agg| agg.fixed_slot(file_type).cloned());

        let value = FileSlotValue::next(
            prior.as_ref(),
            object_url,
            content.content_hash.clone(),
            comments,
            Utc::now(),
        );

        let aggregate = self
            .archive
            .upsert_fixed_slot(target.course_id, target.submitter_id, file_type, &value)
            .await?;

        Ok(UploadOutcome {
            file_id: aggregate.id,
            object_url: value.object_url,
            version: value.version,
            content_hash: value.content_hash,
            status: aggregate.status,
        })
    }

    /// Dynamic-list write: read-modify-write guarded by the aggregate
    /// revision, retried a bounded number of times before giving up with a
    /// conflict.
    async fn record_dynamic(
        &self,
        target: &SlotTarget,
        name: &str,
        kind: DynamicKind,
        object_url: String,
        content: &ContentDescriptor,
        comments: Option<String>,
    ) -> Result<UploadOutcome, AppError> {
        for attempt in 0..DYNAMIC_LIST_CAS_ATTEMPTS {
            let existing = self
                .archive
                .find(target.course_id, target.submitter_id)
                .await?;

            let (value, updated) = match existing {
                None => {
                    let value = FileSlotValue::next(
                        None,
                        object_url.clone(),
                        content.content_hash.clone(),
                        comments.clone(),
                        Utc::now(),
                    );
                    let mut list = Vec::new();
                    merge_dynamic_entry(&mut list, name, value.clone());
                    let created = self
                        .archive
                        .create_with_dynamic_list(
                            target.course_id,
                            target.submitter_id,
                            kind,
                            &list,
                        )
                        .await?;
                    (value, created)
                }
                Some(aggregate) => {
                    let prior = aggregate.dynamic_entry(kind, name).cloned();
                    let value = FileSlotValue::next(
                        prior.as_ref(),
                        object_url.clone(),
                        content.content_hash.clone(),
                        comments.clone(),
                        Utc::now(),
                    );
                    let mut list = aggregate.dynamic_list(kind).to_vec();
                    merge_dynamic_entry(&mut list, name, value.clone());
                    let updated = self
                        .archive
                        .update_dynamic_list(
                            target.course_id,
                            target.submitter_id,
                            kind,
                            &list,
                            aggregate.revision,
                        )
                        .await?;
                    (value, updated)
                }
            };

            match updated {
                Some(aggregate) => {
                    return Ok(UploadOutcome {
                        file_id: aggregate.id,
                        object_url: value.object_url,
                        version: value.version,
                        content_hash: value.content_hash,
                        status: aggregate.status,
                    });
                }
                None => {
                    warn!(
                        slot_name = %name,
                        attempt = attempt + 1,
                        "Dynamic list write lost a concurrent race, retrying"
                    );
                }
            }
        }

        Err(AppError::Conflict(format!(
            "Concurrent updates to '{}' exceeded {} attempts",
            name, DYNAMIC_LIST_CAS_ATTEMPTS
        )))
    }

    /// Audit templated uploads after the aggregate write lands. Failures are
    /// logged, never surfaced: the upload itself already succeeded.
    async fn audit_template_usage(&self, template_id: Uuid, target: &SlotTarget, file_id: Uuid) {
        if let Err(e) = self
            .templates
            .record_usage(template_id, target.course_id, target.submitter_id, file_id)
            .await
        {
            warn!(
                template_id = %template_id,
                file_id = %file_id,
                error = %e,
                "Failed to record template usage"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use coursevault_core::models::{
        CourseFileAggregate, DynamicFileEntry, ExamComponent, ExamRecord, ExamType, FileStatus,
        Template,
    };
    use coursevault_storage::StorageResult;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::upload::types::{ExamComponentUpload, ExamSetUpload};

    const PDF: &str = "application/pdf";

    struct MemoryBlobStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        put_attempts: AtomicUsize,
        failures_remaining: AtomicUsize,
    }

    impl MemoryBlobStore {
        fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                put_attempts: AtomicUsize::new(0),
                failures_remaining: AtomicUsize::new(0),
            }
        }

        fn failing_first(n: usize) -> Self {
            let store = Self::new();
            store.failures_remaining.store(n, Ordering::SeqCst);
            store
        }

        fn put_count(&self) -> usize {
            self.put_attempts.load(Ordering::SeqCst)
        }

        fn stored_keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn put(
            &self,
            storage_key: &str,
            data: Vec<u8>,
            _content_type: &str,
        ) -> StorageResult<()> {
            self.put_attempts.fetch_add(1, Ordering::SeqCst);
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::UploadFailed("injected".to_string()));
            }
            self.objects
                .lock()
                .unwrap()
                .insert(storage_key.to_string(), data);
            Ok(())
        }

        async fn presign(
            &self,
            storage_key: &str,
            _expires_in: Duration,
        ) -> StorageResult<String> {
            Ok(format!("memory://{}", storage_key))
        }

        async fn ensure_bucket(&self) -> StorageResult<()> {
            Ok(())
        }

        async fn delete(&self, storage_key: &str) -> StorageResult<()> {
            self.objects.lock().unwrap().remove(storage_key);
            Ok(())
        }

        async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
            Ok(self.objects.lock().unwrap().contains_key(storage_key))
        }
    }

    struct MemoryCourseStore {
        known: Vec<Uuid>,
    }

    #[async_trait]
    impl CourseStore for MemoryCourseStore {
        async fn course_exists(&self, course_id: Uuid) -> Result<bool, AppError> {
            Ok(self.known.contains(&course_id))
        }
    }

    fn empty_aggregate(course_id: Uuid, submitter_id: Uuid) -> CourseFileAggregate {
        CourseFileAggregate {
            id: Uuid::new_v4(),
            course_id,
            submitter_id,
            status: FileStatus::Pending,
            attendance_sheet: None,
            final_grades: None,
            obe_summary: None,
            instructor_feedback: None,
            course_outline: None,
            assignment: None,
            lab_experiment: None,
            custom_files: Vec::new(),
            misc_files: Vec::new(),
            revision: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct MemoryArchiveStore {
        aggregates: Mutex<HashMap<(Uuid, Uuid), CourseFileAggregate>>,
        /// Next N dynamic-list CAS writes report a lost race.
        lose_cas_n_times: AtomicUsize,
        /// Next create call is beaten by a concurrent creator: the aggregate
        /// appears (with a rival entry) but the create itself reports `None`.
        surrender_create_once: AtomicBool,
        /// Yield inside `find` so two in-flight uploads interleave their
        /// read-modify-write instead of running back to back.
        yield_in_find: AtomicBool,
    }

    impl MemoryArchiveStore {
        fn new() -> Self {
            Self {
                aggregates: Mutex::new(HashMap::new()),
                lose_cas_n_times: AtomicUsize::new(0),
                surrender_create_once: AtomicBool::new(false),
                yield_in_find: AtomicBool::new(false),
            }
        }

        fn get(&self, course_id: Uuid, submitter_id: Uuid) -> Option<CourseFileAggregate> {
            self.aggregates
                .lock()
                .unwrap()
                .get(&(course_id, submitter_id))
                .cloned()
        }

        fn set_slot_approved(&self, course_id: Uuid, submitter_id: Uuid, ft: FixedFileType) {
            let mut map = self.aggregates.lock().unwrap();
            let agg = map.get_mut(&(course_id, submitter_id)).unwrap();
            let slot = match ft {
                FixedFileType::CourseOutline => &mut agg.course_outline,
                FixedFileType::Assignment => &mut agg.assignment,
                _ => panic!("unsupported in test"),
            };
            slot.as_mut().unwrap().approved_at = Some(Utc::now());
            agg.status = FileStatus::Approved;
        }
    }

    fn write_fixed(agg: &mut CourseFileAggregate, ft: FixedFileType, value: FileSlotValue) {
        let slot = match ft {
            FixedFileType::AttendanceSheet => &mut agg.attendance_sheet,
            FixedFileType::FinalGrades => &mut agg.final_grades,
            FixedFileType::ObeSummary => &mut agg.obe_summary,
            FixedFileType::InstructorFeedback => &mut agg.instructor_feedback,
            FixedFileType::CourseOutline => &mut agg.course_outline,
            FixedFileType::Assignment => &mut agg.assignment,
            FixedFileType::LabExperiment => &mut agg.lab_experiment,
        };
        *slot = Some(value);
    }

    #[async_trait]
    impl ArchiveStore for MemoryArchiveStore {
        async fn find(
            &self,
            course_id: Uuid,
            submitter_id: Uuid,
        ) -> Result<Option<CourseFileAggregate>, AppError> {
            // Snapshot before yielding so a concurrent writer can commit in
            // between, leaving this reader with a stale revision.
            let snapshot = self.get(course_id, submitter_id);
            if self.yield_in_find.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
            Ok(snapshot)
        }

        async fn find_or_create(
            &self,
            course_id: Uuid,
            submitter_id: Uuid,
        ) -> Result<CourseFileAggregate, AppError> {
            let mut map = self.aggregates.lock().unwrap();
            Ok(map
                .entry((course_id, submitter_id))
                .or_insert_with(|| empty_aggregate(course_id, submitter_id))
                .clone())
        }

        async fn upsert_fixed_slot(
            &self,
            course_id: Uuid,
            submitter_id: Uuid,
            file_type: FixedFileType,
            value: &FileSlotValue,
        ) -> Result<CourseFileAggregate, AppError> {
            let mut map = self.aggregates.lock().unwrap();
            let agg = map
                .entry((course_id, submitter_id))
                .or_insert_with(|| empty_aggregate(course_id, submitter_id));
            write_fixed(agg, file_type, value.clone());
            agg.status = FileStatus::Pending;
            agg.updated_at = Utc::now();
            Ok(agg.clone())
        }

        async fn create_with_dynamic_list(
            &self,
            course_id: Uuid,
            submitter_id: Uuid,
            kind: DynamicKind,
            list: &[DynamicFileEntry],
        ) -> Result<Option<CourseFileAggregate>, AppError> {
            let mut map = self.aggregates.lock().unwrap();
            if map.contains_key(&(course_id, submitter_id)) {
                return Ok(None);
            }
            if self.surrender_create_once.swap(false, Ordering::SeqCst) {
                let mut rival = empty_aggregate(course_id, submitter_id);
                rival.custom_files.push(DynamicFileEntry {
                    name: "rival".to_string(),
                    file_data: FileSlotValue::next(
                        None,
                        "memory://rival".to_string(),
                        "ff".repeat(32),
                        None,
                        Utc::now(),
                    ),
                });
                map.insert((course_id, submitter_id), rival);
                return Ok(None);
            }
            let mut agg = empty_aggregate(course_id, submitter_id);
            match kind {
                DynamicKind::Custom => agg.custom_files = list.to_vec(),
                DynamicKind::Misc => agg.misc_files = list.to_vec(),
            }
            map.insert((course_id, submitter_id), agg.clone());
            Ok(Some(agg))
        }

        async fn update_dynamic_list(
            &self,
            course_id: Uuid,
            submitter_id: Uuid,
            kind: DynamicKind,
            list: &[DynamicFileEntry],
            expected_revision: i64,
        ) -> Result<Option<CourseFileAggregate>, AppError> {
            if self
                .lose_cas_n_times
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(None);
            }
            let mut map = self.aggregates.lock().unwrap();
            let agg = match map.get_mut(&(course_id, submitter_id)) {
                Some(a) if a.revision == expected_revision => a,
                _ => return Ok(None),
            };
            match kind {
                DynamicKind::Custom => agg.custom_files = list.to_vec(),
                DynamicKind::Misc => agg.misc_files = list.to_vec(),
            }
            agg.status = FileStatus::Pending;
            agg.revision += 1;
            agg.updated_at = Utc::now();
            Ok(Some(agg.clone()))
        }
    }

    struct MemoryExamStore {
        records: Mutex<HashMap<(Uuid, i32), ExamRecord>>,
    }

    impl MemoryExamStore {
        fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
            }
        }
    }

    fn write_component(rec: &mut ExamRecord, component: ExamComponent, value: FileSlotValue) {
        match component {
            ExamComponent::Question => rec.question = Some(value),
            ExamComponent::Highest => rec.highest = Some(value),
            ExamComponent::Average => rec.average = Some(value),
            ExamComponent::Marginal => rec.marginal = Some(value),
        }
    }

    #[async_trait]
    impl ExamStore for MemoryExamStore {
        async fn find_exam(
            &self,
            course_files_id: Uuid,
            exam_number: i32,
        ) -> Result<Option<ExamRecord>, AppError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&(course_files_id, exam_number))
                .cloned())
        }

        async fn upsert_component(
            &self,
            course_files_id: Uuid,
            exam_type: ExamType,
            exam_number: i32,
            component: ExamComponent,
            value: &FileSlotValue,
        ) -> Result<ExamRecord, AppError> {
            let mut map = self.records.lock().unwrap();
            let rec = map
                .entry((course_files_id, exam_number))
                .or_insert_with(|| ExamRecord {
                    id: Uuid::new_v4(),
                    course_files_id,
                    exam_type,
                    exam_number,
                    question: None,
                    highest: None,
                    average: None,
                    marginal: None,
                    is_completed: false,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                });
            rec.exam_type = exam_type;
            write_component(rec, component, value.clone());
            rec.updated_at = Utc::now();
            Ok(rec.clone())
        }

        async fn recompute_completed(
            &self,
            course_files_id: Uuid,
            exam_number: i32,
        ) -> Result<ExamRecord, AppError> {
            let mut map = self.records.lock().unwrap();
            let rec = map
                .get_mut(&(course_files_id, exam_number))
                .ok_or_else(|| AppError::NotFound("exam".to_string()))?;
            rec.is_completed = rec.compute_completed();
            Ok(rec.clone())
        }
    }

    struct MemoryTemplateStore {
        templates: HashMap<Uuid, Template>,
        usages: Mutex<Vec<(Uuid, Uuid)>>,
        fail_usage: bool,
    }

    impl MemoryTemplateStore {
        fn empty() -> Self {
            Self {
                templates: HashMap::new(),
                usages: Mutex::new(Vec::new()),
                fail_usage: false,
            }
        }

        fn with(template: Template) -> Self {
            let mut store = Self::empty();
            store.templates.insert(template.id, template);
            store
        }
    }

    #[async_trait]
    impl TemplateStore for MemoryTemplateStore {
        async fn get_template(&self, template_id: Uuid) -> Result<Option<Template>, AppError> {
            Ok(self.templates.get(&template_id).cloned())
        }

        async fn record_usage(
            &self,
            template_id: Uuid,
            _course_id: Uuid,
            _submitter_id: Uuid,
            file_id: Uuid,
        ) -> Result<(), AppError> {
            if self.fail_usage {
                return Err(AppError::Internal("audit table down".to_string()));
            }
            self.usages.lock().unwrap().push((template_id, file_id));
            Ok(())
        }
    }

    struct Fixture {
        course_id: Uuid,
        submitter_id: Uuid,
        blobs: Arc<MemoryBlobStore>,
        archive: Arc<MemoryArchiveStore>,
        exams: Arc<MemoryExamStore>,
        templates: Arc<MemoryTemplateStore>,
        service: IngestionService,
    }

    fn fixture_with(blobs: MemoryBlobStore, templates: MemoryTemplateStore) -> Fixture {
        let course_id = Uuid::new_v4();
        let submitter_id = Uuid::new_v4();
        let blobs = Arc::new(blobs);
        let archive = Arc::new(MemoryArchiveStore::new());
        let exams = Arc::new(MemoryExamStore::new());
        let templates = Arc::new(templates);
        let service = IngestionService::new(
            blobs.clone(),
            archive.clone(),
            exams.clone(),
            templates.clone(),
            Arc::new(MemoryCourseStore {
                known: vec![course_id],
            }),
            Duration::from_secs(3600),
        );
        Fixture {
            course_id,
            submitter_id,
            blobs,
            archive,
            exams,
            templates,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryBlobStore::new(), MemoryTemplateStore::empty())
    }

    fn pdf_request(f: &Fixture, filename: &str, data: &[u8]) -> UploadRequest {
        UploadRequest {
            course_id: f.course_id,
            submitter_id: f.submitter_id,
            filename: filename.to_string(),
            content_type: PDF.to_string(),
            data: data.to_vec(),
            comments: None,
        }
    }

    fn fixed(file_type: FixedFileType) -> SlotDescriptor {
        SlotDescriptor::Fixed { file_type }
    }

    fn dynamic(name: &str, kind: DynamicKind, template_id: Option<Uuid>) -> SlotDescriptor {
        SlotDescriptor::Dynamic {
            name: name.to_string(),
            kind,
            template_id,
        }
    }

    fn template(id: Uuid, file_types: &[&str], max_size: Option<i64>, status: bool) -> Template {
        Template {
            id,
            name: "policy".to_string(),
            description: None,
            is_required: false,
            file_types: file_types.iter().map(|s| s.to_string()).collect(),
            max_size,
            status,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fixed_upload_creates_version_one() {
        let f = fixture();
        let outcome = f
            .service
            .upload_fixed(
                pdf_request(&f, "outline.pdf", b"content"),
                FixedFileType::CourseOutline,
            )
            .await
            .unwrap();

        assert_eq!(outcome.version, 1);
        assert_eq!(outcome.status, FileStatus::Pending);
        assert_eq!(
            outcome.object_url,
            format!("memory://{}/course_outline/outline.pdf", f.course_id)
        );

        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        assert_eq!(agg.course_outline.as_ref().unwrap().version, 1);
        assert!(agg.course_outline.as_ref().unwrap().approved_at.is_none());
    }

    #[tokio::test]
    async fn test_fixed_reupload_increments_version_and_resets_approval() {
        let f = fixture();
        f.service
            .upload_slot(
                pdf_request(&f, "outline.pdf", b"v1"),
                fixed(FixedFileType::CourseOutline),
            )
            .await
            .unwrap();
        f.archive
            .set_slot_approved(f.course_id, f.submitter_id, FixedFileType::CourseOutline);

        let outcome = f
            .service
            .upload_slot(
                pdf_request(&f, "outline.pdf", b"v2"),
                fixed(FixedFileType::CourseOutline),
            )
            .await
            .unwrap();

        assert_eq!(outcome.version, 2);
        assert_eq!(outcome.status, FileStatus::Pending);
        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        assert!(agg.course_outline.as_ref().unwrap().approved_at.is_none());
    }

    #[tokio::test]
    async fn test_fixed_slots_are_disjoint() {
        let f = fixture();
        f.service
            .upload_slot(
                pdf_request(&f, "outline.pdf", b"a"),
                fixed(FixedFileType::CourseOutline),
            )
            .await
            .unwrap();
        f.service
            .upload_slot(
                pdf_request(&f, "a1.pdf", b"b"),
                fixed(FixedFileType::Assignment),
            )
            .await
            .unwrap();

        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        assert_eq!(agg.course_outline.as_ref().unwrap().version, 1);
        assert_eq!(agg.assignment.as_ref().unwrap().version, 1);
        assert!(agg.attendance_sheet.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_media_type_rejected_before_storage() {
        let f = fixture();
        let mut request = pdf_request(&f, "tool.exe", b"mz");
        request.content_type = "application/x-msdownload".to_string();

        let err = f
            .service
            .upload_slot(request, fixed(FixedFileType::Assignment))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "UNSUPPORTED_MEDIA_TYPE");
        assert_eq!(f.blobs.put_count(), 0);
        assert!(f.archive.get(f.course_id, f.submitter_id).is_none());
    }

    #[tokio::test]
    async fn test_oversized_file_rejected_before_storage() {
        let f = fixture();
        let big = vec![0u8; (10 * 1024 * 1024 + 1) as usize];
        let err = f
            .service
            .upload_slot(
                pdf_request(&f, "big.pdf", &big),
                fixed(FixedFileType::FinalGrades),
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "FILE_TOO_LARGE");
        assert_eq!(f.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_course_rejected() {
        let f = fixture();
        let mut request = pdf_request(&f, "outline.pdf", b"x");
        request.course_id = Uuid::new_v4();

        let err = f
            .service
            .upload_slot(request, fixed(FixedFileType::CourseOutline))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(f.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn test_dynamic_upload_appends_then_replaces_in_place() {
        let f = fixture();
        for name in ["guidelines", "rubric", "syllabus"] {
            f.service
                .upload_dynamic(
                    pdf_request(&f, "doc.pdf", name.as_bytes()),
                    name.to_string(),
                    DynamicKind::Custom,
                    None,
                )
                .await
                .unwrap();
        }

        let outcome = f
            .service
            .upload_slot(
                pdf_request(&f, "doc2.pdf", b"new rubric"),
                dynamic("rubric", DynamicKind::Custom, None),
            )
            .await
            .unwrap();
        assert_eq!(outcome.version, 2);

        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        let names: Vec<_> = agg.custom_files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["guidelines", "rubric", "syllabus"]);
        assert_eq!(agg.custom_files[1].file_data.version, 2);
        assert_eq!(agg.custom_files[0].file_data.version, 1);
    }

    #[tokio::test]
    async fn test_custom_and_misc_lists_are_independent() {
        let f = fixture();
        f.service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                dynamic("notes", DynamicKind::Custom, None),
            )
            .await
            .unwrap();
        f.service
            .upload_slot(
                pdf_request(&f, "b.pdf", b"b"),
                dynamic("notes", DynamicKind::Misc, None),
            )
            .await
            .unwrap();

        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        assert_eq!(agg.custom_files.len(), 1);
        assert_eq!(agg.misc_files.len(), 1);
        assert_eq!(agg.custom_files[0].file_data.version, 1);
        assert_eq!(agg.misc_files[0].file_data.version, 1);
    }

    #[tokio::test]
    async fn test_invalid_dynamic_name_rejected() {
        let f = fixture();
        let err = f
            .service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                dynamic("bad name!", DynamicKind::Custom, None),
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "INVALID_SLOT_NAME");
        assert_eq!(f.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn test_template_policy_enforced_and_usage_recorded() {
        let template_id = Uuid::new_v4();
        let f = fixture_with(
            MemoryBlobStore::new(),
            MemoryTemplateStore::with(template(template_id, &["pdf"], Some(1024), true)),
        );

        let outcome = f
            .service
            .upload_slot(
                pdf_request(&f, "small.pdf", b"ok"),
                dynamic("report", DynamicKind::Custom, Some(template_id)),
            )
            .await
            .unwrap();

        assert_eq!(outcome.version, 1);
        let usages = f.templates.usages.lock().unwrap();
        assert_eq!(usages.as_slice(), &[(template_id, outcome.file_id)]);
    }

    #[tokio::test]
    async fn test_template_size_ceiling_overrides_builtin() {
        let template_id = Uuid::new_v4();
        let f = fixture_with(
            MemoryBlobStore::new(),
            MemoryTemplateStore::with(template(template_id, &["pdf"], Some(4), true)),
        );

        let err = f
            .service
            .upload_slot(
                pdf_request(&f, "five.pdf", b"12345"),
                dynamic("report", DynamicKind::Custom, Some(template_id)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "FILE_TOO_LARGE");
        assert_eq!(f.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn test_inactive_template_rejected_as_not_found() {
        let template_id = Uuid::new_v4();
        let f = fixture_with(
            MemoryBlobStore::new(),
            MemoryTemplateStore::with(template(template_id, &["pdf"], None, false)),
        );

        let err = f
            .service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                dynamic("report", DynamicKind::Custom, Some(template_id)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "TEMPLATE_NOT_FOUND");
        assert_eq!(f.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_template_id_rejected() {
        let f = fixture();
        let err = f
            .service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                dynamic("report", DynamicKind::Custom, Some(Uuid::new_v4())),
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "TEMPLATE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_usage_audit_failure_does_not_fail_upload() {
        let template_id = Uuid::new_v4();
        let mut templates = MemoryTemplateStore::with(template(template_id, &["pdf"], None, true));
        templates.fail_usage = true;
        let f = fixture_with(MemoryBlobStore::new(), templates);

        let outcome = f
            .service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                dynamic("report", DynamicKind::Custom, Some(template_id)),
            )
            .await
            .unwrap();

        assert_eq!(outcome.version, 1);
    }

    #[tokio::test]
    async fn test_dynamic_cas_exhaustion_yields_conflict() {
        let f = fixture();
        // Seed an aggregate so the update (not create) path runs.
        f.service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                dynamic("seed", DynamicKind::Custom, None),
            )
            .await
            .unwrap();
        f.archive
            .lose_cas_n_times
            .store(usize::MAX, Ordering::SeqCst);

        let err = f
            .service
            .upload_slot(
                pdf_request(&f, "b.pdf", b"b"),
                dynamic("seed", DynamicKind::Custom, None),
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[tokio::test]
    async fn test_dynamic_cas_lost_race_recovers_on_retry() {
        let f = fixture();
        f.service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                dynamic("first", DynamicKind::Custom, None),
            )
            .await
            .unwrap();
        f.archive.lose_cas_n_times.store(1, Ordering::SeqCst);

        let outcome = f
            .service
            .upload_slot(
                pdf_request(&f, "b.pdf", b"b"),
                dynamic("second", DynamicKind::Custom, None),
            )
            .await
            .unwrap();

        assert_eq!(outcome.version, 1);
        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        let names: Vec<_> = agg.custom_files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(agg.custom_files[0].file_data.version, 1);
        assert_eq!(f.archive.lose_cas_n_times.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_interleaved_writes_to_distinct_entries_both_survive() {
        let f = fixture();
        // Seed the aggregate so both writers race on the update path, and
        // make every read yield so their read-modify-writes interleave.
        f.service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                dynamic("seed", DynamicKind::Custom, None),
            )
            .await
            .unwrap();
        f.archive.yield_in_find.store(true, Ordering::SeqCst);

        let (left, right) = tokio::join!(
            f.service.upload_slot(
                pdf_request(&f, "l.pdf", b"left"),
                dynamic("left", DynamicKind::Custom, None),
            ),
            f.service.upload_slot(
                pdf_request(&f, "r.pdf", b"right"),
                dynamic("right", DynamicKind::Custom, None),
            ),
        );
        left.unwrap();
        right.unwrap();

        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        let mut names: Vec<_> = agg.custom_files.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["left", "right", "seed"]);
    }

    #[tokio::test]
    async fn test_create_beaten_by_concurrent_creator_falls_back_to_update() {
        let f = fixture();
        f.archive.surrender_create_once.store(true, Ordering::SeqCst);

        let outcome = f
            .service
            .upload_slot(
                pdf_request(&f, "mine.pdf", b"mine"),
                dynamic("mine", DynamicKind::Custom, None),
            )
            .await
            .unwrap();

        assert_eq!(outcome.version, 1);
        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        let names: Vec<_> = agg.custom_files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["rival", "mine"]);
    }

    #[tokio::test]
    async fn test_blob_put_retried_once_on_failure() {
        let f = fixture_with(MemoryBlobStore::failing_first(1), MemoryTemplateStore::empty());
        let outcome = f
            .service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                fixed(FixedFileType::CourseOutline),
            )
            .await
            .unwrap();

        assert_eq!(outcome.version, 1);
        assert_eq!(f.blobs.put_count(), 2);
        assert_eq!(f.blobs.stored_keys().len(), 1);
    }

    #[tokio::test]
    async fn test_blob_put_failing_twice_fails_upload() {
        let f = fixture_with(MemoryBlobStore::failing_first(2), MemoryTemplateStore::empty());
        let err = f
            .service
            .upload_slot(
                pdf_request(&f, "a.pdf", b"a"),
                fixed(FixedFileType::CourseOutline),
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert!(f.archive.get(f.course_id, f.submitter_id).is_none());
    }

    #[tokio::test]
    async fn test_exam_component_rejected_on_slot_endpoint() {
        let f = fixture();
        let err = f
            .service
            .upload_slot(
                pdf_request(&f, "q.pdf", b"q"),
                SlotDescriptor::ExamComponent {
                    exam_type: ExamType::Mid,
                    exam_number: 1,
                    component: ExamComponent::Question,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    fn exam_file(component: ExamComponent, data: &[u8]) -> ExamComponentUpload {
        ExamComponentUpload {
            component,
            filename: format!("{}.pdf", component.as_str()),
            content_type: PDF.to_string(),
            data: data.to_vec(),
        }
    }

    fn exam_request(f: &Fixture, sets: Vec<ExamSetUpload>) -> ExamUploadRequest {
        ExamUploadRequest {
            course_id: f.course_id,
            submitter_id: f.submitter_id,
            exam_type: ExamType::Mid,
            sets,
            comments: None,
        }
    }

    #[tokio::test]
    async fn test_exam_upload_with_no_files_rejected() {
        let f = fixture();
        let err = f
            .service
            .upload_exam_set(exam_request(
                &f,
                vec![ExamSetUpload {
                    exam_number: 1,
                    files: vec![],
                }],
            ))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "NO_FILES_PROVIDED");
        assert_eq!(f.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn test_exam_full_set_is_complete() {
        let f = fixture();
        let outcome = f
            .service
            .upload_exam_set(exam_request(
                &f,
                vec![ExamSetUpload {
                    exam_number: 1,
                    files: vec![
                        exam_file(ExamComponent::Question, b"q"),
                        exam_file(ExamComponent::Highest, b"h"),
                        exam_file(ExamComponent::Average, b"a"),
                        exam_file(ExamComponent::Marginal, b"m"),
                    ],
                }],
            ))
            .await
            .unwrap();

        assert_eq!(outcome.sets.len(), 1);
        let set = &outcome.sets[0];
        assert!(set.is_complete);
        assert!(set.pending_files.is_empty());
        assert_eq!(set.uploaded_files.len(), 4);
    }

    #[tokio::test]
    async fn test_exam_partial_set_lists_pending_components() {
        let f = fixture();
        let outcome = f
            .service
            .upload_exam_set(exam_request(
                &f,
                vec![ExamSetUpload {
                    exam_number: 2,
                    files: vec![
                        exam_file(ExamComponent::Question, b"q"),
                        exam_file(ExamComponent::Highest, b"h"),
                    ],
                }],
            ))
            .await
            .unwrap();

        let set = &outcome.sets[0];
        assert!(!set.is_complete);
        assert_eq!(
            set.pending_files,
            vec![ExamComponent::Average, ExamComponent::Marginal]
        );
    }

    #[tokio::test]
    async fn test_exam_set_completed_across_requests() {
        let f = fixture();
        f.service
            .upload_exam_set(exam_request(
                &f,
                vec![ExamSetUpload {
                    exam_number: 1,
                    files: vec![
                        exam_file(ExamComponent::Question, b"q"),
                        exam_file(ExamComponent::Highest, b"h"),
                        exam_file(ExamComponent::Average, b"a"),
                    ],
                }],
            ))
            .await
            .unwrap();

        let outcome = f
            .service
            .upload_exam_set(exam_request(
                &f,
                vec![ExamSetUpload {
                    exam_number: 1,
                    files: vec![exam_file(ExamComponent::Marginal, b"m")],
                }],
            ))
            .await
            .unwrap();

        assert!(outcome.sets[0].is_complete);
    }

    #[tokio::test]
    async fn test_exam_component_reupload_increments_version() {
        let f = fixture();
        f.service
            .upload_exam_set(exam_request(
                &f,
                vec![ExamSetUpload {
                    exam_number: 1,
                    files: vec![exam_file(ExamComponent::Question, b"v1")],
                }],
            ))
            .await
            .unwrap();
        f.service
            .upload_exam_set(exam_request(
                &f,
                vec![ExamSetUpload {
                    exam_number: 1,
                    files: vec![exam_file(ExamComponent::Question, b"v2")],
                }],
            ))
            .await
            .unwrap();

        let agg = f.archive.get(f.course_id, f.submitter_id).unwrap();
        let rec = f
            .exams
            .records
            .lock()
            .unwrap()
            .get(&(agg.id, 1))
            .cloned()
            .unwrap();
        assert_eq!(rec.question.as_ref().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_exam_invalid_number_rejects_batch_before_storage() {
        let f = fixture();
        let err = f
            .service
            .upload_exam_set(exam_request(
                &f,
                vec![
                    ExamSetUpload {
                        exam_number: 1,
                        files: vec![exam_file(ExamComponent::Question, b"q")],
                    },
                    ExamSetUpload {
                        exam_number: 3,
                        files: vec![exam_file(ExamComponent::Question, b"q")],
                    },
                ],
            ))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert_eq!(f.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn test_exam_sets_are_independent() {
        let f = fixture();
        let outcome = f
            .service
            .upload_exam_set(exam_request(
                &f,
                vec![
                    ExamSetUpload {
                        exam_number: 1,
                        files: vec![
                            exam_file(ExamComponent::Question, b"q"),
                            exam_file(ExamComponent::Highest, b"h"),
                            exam_file(ExamComponent::Average, b"a"),
                            exam_file(ExamComponent::Marginal, b"m"),
                        ],
                    },
                    ExamSetUpload {
                        exam_number: 2,
                        files: vec![exam_file(ExamComponent::Question, b"q2")],
                    },
                ],
            ))
            .await
            .unwrap();

        assert_eq!(outcome.sets.len(), 2);
        assert!(outcome.sets[0].is_complete);
        assert!(!outcome.sets[1].is_complete);
    }
}
