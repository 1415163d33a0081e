//! Error types module
//!
//! All errors are unified under the `AppError` enum, which can represent
//! database, storage, validation, and slot-addressing failures.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx`
//! feature so pure-domain consumers can build without a database stack.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid slot name: {0}")]
    InvalidSlotName(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Unsupported file type '{extension}'; allowed: {}", allowed.join(", "))]
    UnsupportedFileType {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("File too large: {size} bytes exceeds limit of {max_size} bytes")]
    FileTooLarge { size: i64, max_size: i64 },

    #[error("No files provided")]
    NoFilesProvided,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl AppError {
    /// Machine-readable error code (e.g. "FILE_TOO_LARGE").
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::InvalidSlotName(_) => "INVALID_SLOT_NAME",
            AppError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            AppError::UnsupportedFileType { .. } => "UNSUPPORTED_FILE_TYPE",
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::NoFilesProvided => "NO_FILES_PROVIDED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code equivalent for transport layers.
    pub fn http_status_code(&self) -> u16 {
        match self {
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => 500,
            AppError::NotFound(_) | AppError::TemplateNotFound(_) => 404,
            AppError::FileTooLarge { .. } => 413,
            AppError::Conflict(_) => 409,
            AppError::InvalidInput(_)
            | AppError::InvalidSlotName(_)
            | AppError::UnsupportedMediaType(_)
            | AppError::UnsupportedFileType { .. }
            | AppError::NoFilesProvided => 400,
        }
    }

    /// Whether a retry may succeed without the client changing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Storage(_)
                | AppError::Internal(_)
                | AppError::Conflict(_)
        )
    }
}
