//! Slot taxonomy for the archive engine.
//!
//! Every upload addresses exactly one slot of a submitter's course aggregate:
//! a fixed slot from a closed enumeration, a named entry in one of the two
//! dynamic lists, or one component of an exam set. The taxonomy is a closed
//! sum type so new slot kinds cannot be silently ignored downstream.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

static SLOT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid slot name regex"));

/// The seven fixed document slots of a course aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum FixedFileType {
    AttendanceSheet,
    FinalGrades,
    ObeSummary,
    InstructorFeedback,
    CourseOutline,
    Assignment,
    LabExperiment,
}

impl FixedFileType {
    pub const ALL: [FixedFileType; 7] = [
        FixedFileType::AttendanceSheet,
        FixedFileType::FinalGrades,
        FixedFileType::ObeSummary,
        FixedFileType::InstructorFeedback,
        FixedFileType::CourseOutline,
        FixedFileType::Assignment,
        FixedFileType::LabExperiment,
    ];

    /// Stable identifier, used both as the aggregate column and as the
    /// storage key segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            FixedFileType::AttendanceSheet => "attendance_sheet",
            FixedFileType::FinalGrades => "final_grades",
            FixedFileType::ObeSummary => "obe_summary",
            FixedFileType::InstructorFeedback => "instructor_feedback",
            FixedFileType::CourseOutline => "course_outline",
            FixedFileType::Assignment => "assignment",
            FixedFileType::LabExperiment => "lab_experiment",
        }
    }
}

/// Which of the two dynamic lists a named upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DynamicKind {
    Custom,
    Misc,
}

impl DynamicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DynamicKind::Custom => "custom",
            DynamicKind::Misc => "misc",
        }
    }

    /// Aggregate column holding the list for this kind.
    pub fn column(&self) -> &'static str {
        match self {
            DynamicKind::Custom => "custom_files",
            DynamicKind::Misc => "misc_files",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExamType {
    Mid,
    Quiz,
    Final,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Mid => "MID",
            ExamType::Quiz => "QUIZ",
            ExamType::Final => "FINAL",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "MID" => Some(ExamType::Mid),
            "QUIZ" => Some(ExamType::Quiz),
            "FINAL" => Some(ExamType::Final),
            _ => None,
        }
    }
}

/// The four components of one exam artifact set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExamComponent {
    Question,
    Highest,
    Average,
    Marginal,
}

impl ExamComponent {
    pub const ALL: [ExamComponent; 4] = [
        ExamComponent::Question,
        ExamComponent::Highest,
        ExamComponent::Average,
        ExamComponent::Marginal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExamComponent::Question => "question",
            ExamComponent::Highest => "highest",
            ExamComponent::Average => "average",
            ExamComponent::Marginal => "marginal",
        }
    }
}

/// Logical slot addressed by an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SlotDescriptor {
    Fixed {
        file_type: FixedFileType,
    },
    Dynamic {
        name: String,
        #[serde(rename = "type")]
        kind: DynamicKind,
        template_id: Option<Uuid>,
    },
    ExamComponent {
        exam_type: ExamType,
        exam_number: i32,
        component: ExamComponent,
    },
}

/// Fully classified upload target: the aggregate it belongs to plus the
/// validated slot descriptor. Carries everything needed to build the storage
/// key, locate the prior value, and decide whether an explicit template
/// applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTarget {
    pub course_id: Uuid,
    pub submitter_id: Uuid,
    pub descriptor: SlotDescriptor,
}

impl SlotTarget {
    /// Classify an inbound request into a slot target, rejecting malformed
    /// descriptors before any I/O happens.
    pub fn classify(
        course_id: Uuid,
        submitter_id: Uuid,
        descriptor: SlotDescriptor,
    ) -> Result<Self, AppError> {
        match &descriptor {
            SlotDescriptor::Fixed { .. } => {}
            SlotDescriptor::Dynamic { name, .. } => {
                if !SLOT_NAME_RE.is_match(name) {
                    return Err(AppError::InvalidSlotName(format!(
                        "'{}' may only contain letters, numbers, underscores and hyphens",
                        name
                    )));
                }
            }
            SlotDescriptor::ExamComponent { exam_number, .. } => {
                if !(1..=2).contains(exam_number) {
                    return Err(AppError::InvalidInput(format!(
                        "Exam number must be 1 or 2, got {}",
                        exam_number
                    )));
                }
            }
        }

        Ok(SlotTarget {
            course_id,
            submitter_id,
            descriptor,
        })
    }

    /// Explicit template referenced by this slot, if any. Fixed slots always
    /// use the built-in policy and never carry one.
    pub fn template_id(&self) -> Option<Uuid> {
        match &self.descriptor {
            SlotDescriptor::Dynamic { template_id, .. } => *template_id,
            _ => None,
        }
    }
}
