//! Upload validation: media-type mapping and template policy enforcement.
//!
//! Rules run in a fixed order and the first failure wins: template existence
//! and activity, then extension membership, then size ceiling.

use crate::constants::{FIXED_ALLOWED_EXTENSIONS, FIXED_MAX_SIZE_BYTES};
use crate::error::AppError;
use crate::models::template::Template;

/// Effective validation policy for one upload, either derived from an
/// explicit template or the built-in fixed-slot policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub file_types: Vec<String>,
    pub max_size: Option<i64>,
}

/// Built-in policy applied to fixed slots and to dynamic/exam uploads that
/// carry no explicit template: PDF or Word documents, at most 10 MiB.
pub fn builtin_policy() -> UploadPolicy {
    UploadPolicy {
        file_types: FIXED_ALLOWED_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect(),
        max_size: Some(FIXED_MAX_SIZE_BYTES),
    }
}

impl UploadPolicy {
    /// Derive the effective policy from an explicit template, enforcing the
    /// existence/activity rule first.
    pub fn from_template(template: &Template) -> Result<UploadPolicy, AppError> {
        if !template.status {
            return Err(AppError::TemplateNotFound(format!(
                "Template '{}' is inactive",
                template.name
            )));
        }
        Ok(UploadPolicy {
            file_types: template
                .file_types
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            max_size: template.max_size,
        })
    }
}

/// Normalize a MIME type by stripping parameters
/// (e.g. "application/pdf; charset=utf-8" -> "application/pdf").
fn normalize_mime_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
}

/// Derive the canonical file extension from the declared media type.
/// Unmapped media types fail the upload before any storage write.
pub fn derive_extension(content_type: &str) -> Result<String, AppError> {
    let normalized = normalize_mime_type(content_type).to_lowercase();
    match normalized.as_str() {
        "application/pdf" => Ok("pdf".to_string()),
        "application/msword" => Ok("doc".to_string()),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Ok("docx".to_string())
        }
        other => Err(AppError::UnsupportedMediaType(other.to_string())),
    }
}

/// Validate a derived extension and buffer size against a policy.
/// Extension membership is checked before the size ceiling.
pub fn validate_against_policy(
    policy: &UploadPolicy,
    extension: &str,
    size: usize,
) -> Result<(), AppError> {
    if !policy.file_types.iter().any(|t| t == extension) {
        return Err(AppError::UnsupportedFileType {
            extension: extension.to_string(),
            allowed: policy.file_types.clone(),
        });
    }

    if let Some(max_size) = policy.max_size {
        if size as i64 > max_size {
            return Err(AppError::FileTooLarge {
                size: size as i64,
                max_size,
            });
        }
    }

    Ok(())
}

/// Sanitize a client-supplied filename: reject traversal, strip any path,
/// replace characters that are unsafe in storage keys.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    const MAX_FILENAME_LENGTH: usize = 255;

    // Traversal means a ".." path segment in the raw input; ".." embedded in
    // a plain name ("report..v2.pdf") is harmless.
    if filename.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let path = std::path::Path::new(filename);
    let filename_only = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Ok("file".to_string());
    }

    Ok(sanitized)
}
