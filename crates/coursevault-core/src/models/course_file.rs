//! Per-(course, submitter) aggregate and the versioned slot values it owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::slot::{DynamicKind, FixedFileType};

/// Review status of an aggregate. Driven by an external review workflow;
/// the engine only ever resets it to Pending on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    Pending,
    Approved,
    Rejected,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "PENDING",
            FileStatus::Approved => "APPROVED",
            FileStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(FileStatus::Pending),
            "APPROVED" => Some(FileStatus::Approved),
            "REJECTED" => Some(FileStatus::Rejected),
            _ => None,
        }
    }
}

/// Value stored per slot: one versioned, fingerprinted file reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileSlotValue {
    /// Presigned access URL issued at upload time.
    pub object_url: String,
    /// Strictly increasing per slot, starting at 1.
    pub version: i32,
    /// Hex SHA-256 of the raw upload bytes.
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
    /// Set only by the external review workflow. Reset to `None` on every
    /// new upload so approval must be re-granted per version.
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl FileSlotValue {
    /// Compute the successor value for a slot. Pure: no clock or I/O beyond
    /// the `now` argument.
    pub fn next(
        prior: Option<&FileSlotValue>,
        object_url: String,
        content_hash: String,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> FileSlotValue {
        FileSlotValue {
            object_url,
            version: prior.map(|p| p.version).unwrap_or(0) + 1,
            content_hash,
            updated_at: now,
            approved_at: None,
            comments,
        }
    }
}

/// One named entry in a dynamic list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFileEntry {
    pub name: String,
    pub file_data: FileSlotValue,
}

/// Replace the entry matching `name` in place, or append a new one.
/// Order of unrelated entries is preserved.
pub fn merge_dynamic_entry(
    list: &mut Vec<DynamicFileEntry>,
    name: &str,
    file_data: FileSlotValue,
) {
    match list.iter_mut().find(|e| e.name == name) {
        Some(entry) => entry.file_data = file_data,
        None => list.push(DynamicFileEntry {
            name: name.to_string(),
            file_data,
        }),
    }
}

/// Root document holding all of one submitter's slots for one course.
/// Unique on (course_id, submitter_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseFileAggregate {
    pub id: Uuid,
    pub course_id: Uuid,
    pub submitter_id: Uuid,
    pub status: FileStatus,
    pub attendance_sheet: Option<FileSlotValue>,
    pub final_grades: Option<FileSlotValue>,
    pub obe_summary: Option<FileSlotValue>,
    pub instructor_feedback: Option<FileSlotValue>,
    pub course_outline: Option<FileSlotValue>,
    pub assignment: Option<FileSlotValue>,
    pub lab_experiment: Option<FileSlotValue>,
    pub custom_files: Vec<DynamicFileEntry>,
    pub misc_files: Vec<DynamicFileEntry>,
    /// Optimistic-concurrency counter for dynamic-list read-modify-write.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseFileAggregate {
    /// Current value at a fixed slot.
    pub fn fixed_slot(&self, file_type: FixedFileType) -> Option<&FileSlotValue> {
        match file_type {
            FixedFileType::AttendanceSheet => self.attendance_sheet.as_ref(),
            FixedFileType::FinalGrades => self.final_grades.as_ref(),
            FixedFileType::ObeSummary => self.obe_summary.as_ref(),
            FixedFileType::InstructorFeedback => self.instructor_feedback.as_ref(),
            FixedFileType::CourseOutline => self.course_outline.as_ref(),
            FixedFileType::Assignment => self.assignment.as_ref(),
            FixedFileType::LabExperiment => self.lab_experiment.as_ref(),
        }
    }

    pub fn dynamic_list(&self, kind: DynamicKind) -> &[DynamicFileEntry] {
        match kind {
            DynamicKind::Custom => &self.custom_files,
            DynamicKind::Misc => &self.misc_files,
        }
    }

    /// Current value at a named dynamic entry, if present.
    pub fn dynamic_entry(&self, kind: DynamicKind, name: &str) -> Option<&FileSlotValue> {
        self.dynamic_list(kind)
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.file_data)
    }
}
