//! Shared storage-key derivation for all backends.
//!
//! The key is an ordered, slash-delimited path of course id, slot-specific
//! segments, and the (sanitized) original filename. Two uploads to the same
//! slot share a prefix and differ only by filename, so a re-upload under an
//! identical filename overwrites the previous object while the aggregate
//! still records a new version and hash.

use coursevault_core::models::SlotDescriptor;
use uuid::Uuid;

/// Derive the storage key for one slot upload.
pub fn slot_storage_key(course_id: Uuid, descriptor: &SlotDescriptor, filename: &str) -> String {
    match descriptor {
        SlotDescriptor::Fixed { file_type } => {
            format!("{}/{}/{}", course_id, file_type.as_str(), filename)
        }
        SlotDescriptor::Dynamic { name, kind, .. } => {
            format!("{}/{}/{}/{}", course_id, kind.as_str(), name, filename)
        }
        SlotDescriptor::ExamComponent {
            exam_type,
            exam_number,
            component,
        } => format!(
            "{}/exams/{}/{}/{}/{}",
            course_id,
            exam_type.as_str(),
            exam_number,
            component.as_str(),
            filename
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursevault_core::models::{DynamicKind, ExamComponent, ExamType, FixedFileType};

    #[test]
    fn test_fixed_key_layout() {
        let course_id = Uuid::nil();
        let key = slot_storage_key(
            course_id,
            &SlotDescriptor::Fixed {
                file_type: FixedFileType::CourseOutline,
            },
            "outline.pdf",
        );
        assert_eq!(
            key,
            format!("{}/course_outline/outline.pdf", course_id)
        );
    }

    #[test]
    fn test_dynamic_key_layout() {
        let course_id = Uuid::nil();
        let key = slot_storage_key(
            course_id,
            &SlotDescriptor::Dynamic {
                name: "project_guidelines".to_string(),
                kind: DynamicKind::Custom,
                template_id: None,
            },
            "v2.docx",
        );
        assert_eq!(
            key,
            format!("{}/custom/project_guidelines/v2.docx", course_id)
        );
    }

    #[test]
    fn test_exam_key_layout() {
        let course_id = Uuid::nil();
        let key = slot_storage_key(
            course_id,
            &SlotDescriptor::ExamComponent {
                exam_type: ExamType::Mid,
                exam_number: 2,
                component: ExamComponent::Highest,
            },
            "scan.pdf",
        );
        assert_eq!(key, format!("{}/exams/MID/2/highest/scan.pdf", course_id));
    }

    #[test]
    fn test_key_is_deterministic() {
        let course_id = Uuid::new_v4();
        let descriptor = SlotDescriptor::Fixed {
            file_type: FixedFileType::Assignment,
        };
        assert_eq!(
            slot_storage_key(course_id, &descriptor, "a1.pdf"),
            slot_storage_key(course_id, &descriptor, "a1.pdf")
        );
    }
}
