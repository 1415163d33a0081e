//! Administrator-defined validation templates and their usage audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Validation policy for dynamic/exam uploads: allowed extensions and an
/// optional size ceiling. Inactive templates (`status = false`) reject all
/// uploads referencing them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_required: bool,
    /// Lowercase extensions without the leading dot, e.g. `["pdf", "docx"]`.
    pub file_types: Vec<String>,
    /// Maximum upload size in bytes; `None` means no ceiling.
    pub max_size: Option<i64>,
    pub status: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit fact recording one successful templated upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUsage {
    pub id: Uuid,
    pub template_id: Uuid,
    pub course_id: Uuid,
    pub submitter_id: Uuid,
    /// Aggregate the upload landed on.
    pub file_id: Uuid,
    pub used_at: DateTime<Utc>,
}
