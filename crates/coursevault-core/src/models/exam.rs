//! Exam artifact sets: up to four named components per (aggregate, set number).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::course_file::FileSlotValue;
use super::slot::{ExamComponent, ExamType};

/// One exam record, unique on (course_files_id, exam_number). Created on the
/// first component upload; later uploads touch only their own component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub id: Uuid,
    pub course_files_id: Uuid,
    pub exam_type: ExamType,
    pub exam_number: i32,
    pub question: Option<FileSlotValue>,
    pub highest: Option<FileSlotValue>,
    pub average: Option<FileSlotValue>,
    pub marginal: Option<FileSlotValue>,
    /// Derived: true iff all four components are present.
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExamRecord {
    pub fn component(&self, component: ExamComponent) -> Option<&FileSlotValue> {
        match component {
            ExamComponent::Question => self.question.as_ref(),
            ExamComponent::Highest => self.highest.as_ref(),
            ExamComponent::Average => self.average.as_ref(),
            ExamComponent::Marginal => self.marginal.as_ref(),
        }
    }

    /// Component kinds currently present on this record.
    pub fn uploaded_components(&self) -> Vec<ExamComponent> {
        ExamComponent::ALL
            .into_iter()
            .filter(|c| self.component(*c).is_some())
            .collect()
    }

    /// Component kinds still missing from this record.
    pub fn pending_components(&self) -> Vec<ExamComponent> {
        ExamComponent::ALL
            .into_iter()
            .filter(|c| self.component(*c).is_none())
            .collect()
    }

    /// Recompute the completeness flag from the four component slots.
    pub fn compute_completed(&self) -> bool {
        self.pending_components().is_empty()
    }
}

/// Outcome of processing one exam set within an upload request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamSetResult {
    pub exam_id: Uuid,
    pub exam_number: i32,
    pub uploaded_files: Vec<ExamComponent>,
    pub pending_files: Vec<ExamComponent>,
    pub is_complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_value() -> FileSlotValue {
        FileSlotValue {
            object_url: "https://blob/q".to_string(),
            version: 1,
            content_hash: "00".repeat(32),
            updated_at: Utc::now(),
            approved_at: None,
            comments: None,
        }
    }

    fn record() -> ExamRecord {
        ExamRecord {
            id: Uuid::new_v4(),
            course_files_id: Uuid::new_v4(),
            exam_type: ExamType::Mid,
            exam_number: 1,
            question: None,
            highest: None,
            average: None,
            marginal: None,
            is_completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_record_all_pending() {
        let rec = record();
        assert!(rec.uploaded_components().is_empty());
        assert_eq!(rec.pending_components().len(), 4);
        assert!(!rec.compute_completed());
    }

    #[test]
    fn test_partial_record_lists_missing_components() {
        let mut rec = record();
        rec.question = Some(slot_value());
        rec.highest = Some(slot_value());
        assert_eq!(
            rec.uploaded_components(),
            vec![ExamComponent::Question, ExamComponent::Highest]
        );
        assert_eq!(
            rec.pending_components(),
            vec![ExamComponent::Average, ExamComponent::Marginal]
        );
        assert!(!rec.compute_completed());
    }

    #[test]
    fn test_completed_iff_all_four_present() {
        let mut rec = record();
        rec.question = Some(slot_value());
        rec.highest = Some(slot_value());
        rec.average = Some(slot_value());
        assert!(!rec.compute_completed());
        rec.marginal = Some(slot_value());
        assert!(rec.compute_completed());
    }
}
