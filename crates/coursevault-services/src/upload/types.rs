//! Request and response types for the upload pipeline.

use coursevault_core::models::{ExamComponent, ExamSetResult, ExamType, FileStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One inbound file upload addressed at a fixed or dynamic slot.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub course_id: Uuid,
    pub submitter_id: Uuid,
    /// Client-supplied filename; sanitized before it reaches a storage key.
    pub filename: String,
    /// Declared media type, e.g. `application/pdf`.
    pub content_type: String,
    pub data: Vec<u8>,
    pub comments: Option<String>,
}

/// Result of a successful fixed or dynamic slot upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    /// Id of the aggregate the upload landed on.
    pub file_id: Uuid,
    /// Presigned access URL for the uploaded object.
    pub object_url: String,
    pub version: i32,
    pub content_hash: String,
    pub status: FileStatus,
}

/// One file within an exam set, addressed at a named component.
#[derive(Debug, Clone)]
pub struct ExamComponentUpload {
    pub component: ExamComponent,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// All files for one exam set number within a request.
#[derive(Debug, Clone)]
pub struct ExamSetUpload {
    pub exam_number: i32,
    pub files: Vec<ExamComponentUpload>,
}

/// Batch upload of exam artifacts, grouped by set number.
#[derive(Debug, Clone)]
pub struct ExamUploadRequest {
    pub course_id: Uuid,
    pub submitter_id: Uuid,
    pub exam_type: ExamType,
    pub sets: Vec<ExamSetUpload>,
    pub comments: Option<String>,
}

/// Per-set completeness report returned after an exam upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamUploadOutcome {
    pub file_id: Uuid,
    pub sets: Vec<ExamSetResult>,
}

/// Transport envelope a caller-facing layer serializes for slot uploads.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<UploadOutcome>,
}

impl UploadResponse {
    pub fn ok(outcome: UploadOutcome) -> Self {
        Self {
            success: true,
            message: "File uploaded successfully".to_string(),
            file: Some(outcome),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            file: None,
        }
    }
}

/// Transport envelope for exam set uploads.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamUploadResponse {
    pub success: bool,
    pub message: String,
    pub exam_results: Vec<ExamSetResult>,
}

impl ExamUploadResponse {
    pub fn ok(outcome: &ExamUploadOutcome) -> Self {
        Self {
            success: true,
            message: "Exam files uploaded successfully".to_string(),
            exam_results: outcome.sets.clone(),
        }
    }
}
