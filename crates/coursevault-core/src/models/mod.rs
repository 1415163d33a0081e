//! Domain models for the course file archive.

pub mod course_file;
pub mod exam;
pub mod slot;
pub mod template;

pub use course_file::{
    merge_dynamic_entry, CourseFileAggregate, DynamicFileEntry, FileSlotValue, FileStatus,
};
pub use exam::{ExamRecord, ExamSetResult};
pub use slot::{DynamicKind, ExamComponent, ExamType, FixedFileType, SlotDescriptor, SlotTarget};
pub use template::{Template, TemplateUsage};
