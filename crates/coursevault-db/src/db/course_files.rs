use chrono::{DateTime, Utc};
use coursevault_core::models::{
    CourseFileAggregate, DynamicFileEntry, DynamicKind, FileSlotValue, FileStatus, FixedFileType,
};
use coursevault_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Columns selected for every aggregate read/returning clause.
const AGGREGATE_COLUMNS: &str = "id, course_id, submitter_id, status, \
     attendance_sheet, final_grades, obe_summary, instructor_feedback, \
     course_outline, assignment, lab_experiment, \
     custom_files, misc_files, revision, created_at, updated_at";

fn decode_error(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

fn decode_slot(row: &PgRow, column: &str) -> Result<Option<FileSlotValue>, sqlx::Error> {
    let value: Option<serde_json::Value> = row.try_get(column)?;
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| decode_error(format!("invalid slot value in '{}': {}", column, e)))
}

fn decode_list(row: &PgRow, column: &str) -> Result<Vec<DynamicFileEntry>, sqlx::Error> {
    let value: Option<serde_json::Value> = row.try_get(column)?;
    match value {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| decode_error(format!("invalid dynamic list in '{}': {}", column, e))),
        None => Ok(Vec::new()),
    }
}

fn row_to_aggregate(row: &PgRow) -> Result<CourseFileAggregate, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = FileStatus::from_str_opt(&status)
        .ok_or_else(|| decode_error(format!("unknown file status '{}'", status)))?;

    Ok(CourseFileAggregate {
        id: row.try_get("id")?,
        course_id: row.try_get("course_id")?,
        submitter_id: row.try_get("submitter_id")?,
        status,
        attendance_sheet: decode_slot(row, "attendance_sheet")?,
        final_grades: decode_slot(row, "final_grades")?,
        obe_summary: decode_slot(row, "obe_summary")?,
        instructor_feedback: decode_slot(row, "instructor_feedback")?,
        course_outline: decode_slot(row, "course_outline")?,
        assignment: decode_slot(row, "assignment")?,
        lab_experiment: decode_slot(row, "lab_experiment")?,
        custom_files: decode_list(row, "custom_files")?,
        misc_files: decode_list(row, "misc_files")?,
        revision: row.try_get("revision")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Repository for the per-(course, submitter) aggregate document.
///
/// All writes are field-level patches: a fixed-slot upsert touches only its
/// own jsonb column, a dynamic-list write replaces only the addressed list
/// and is guarded by the row's `revision` counter.
#[derive(Clone)]
pub struct CourseFileRepository {
    pool: PgPool,
}

impl CourseFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the aggregate for one (course, submitter) pair.
    pub async fn find(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
    ) -> Result<Option<CourseFileAggregate>, AppError> {
        let sql = format!(
            "SELECT {} FROM course_files WHERE course_id = $1 AND submitter_id = $2",
            AGGREGATE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(course_id)
            .bind(submitter_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_aggregate(&r)).transpose().map_err(Into::into)
    }

    /// Find the aggregate, creating an empty one when absent. Used by exam
    /// uploads, which need the aggregate id before any slot is written.
    pub async fn find_or_create(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
    ) -> Result<CourseFileAggregate, AppError> {
        sqlx::query(
            r#"
            INSERT INTO course_files (course_id, submitter_id, status)
            VALUES ($1, $2, 'PENDING')
            ON CONFLICT (course_id, submitter_id) DO NOTHING
            "#,
        )
        .bind(course_id)
        .bind(submitter_id)
        .execute(&self.pool)
        .await?;

        self.find(course_id, submitter_id).await?.ok_or_else(|| {
            AppError::Internal(format!(
                "Aggregate for course {} / submitter {} vanished after insert",
                course_id, submitter_id
            ))
        })
    }

    /// Upsert one fixed slot. Only the addressed column is written; sibling
    /// slots are untouched and `status` resets to PENDING.
    pub async fn upsert_fixed_slot(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        file_type: FixedFileType,
        value: &FileSlotValue,
    ) -> Result<CourseFileAggregate, AppError> {
        // Column name comes from a closed enum, never from client input.
        let col = file_type.as_str();
        let sql = format!(
            r#"
            INSERT INTO course_files (course_id, submitter_id, status, {col})
            VALUES ($1, $2, 'PENDING', $3)
            ON CONFLICT (course_id, submitter_id)
            DO UPDATE SET {col} = EXCLUDED.{col}, status = 'PENDING', updated_at = NOW()
            RETURNING {columns}
            "#,
            col = col,
            columns = AGGREGATE_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(course_id)
            .bind(submitter_id)
            .bind(serde_json::to_value(value)?)
            .fetch_one(&self.pool)
            .await?;

        Ok(row_to_aggregate(&row)?)
    }

    /// Replace a dynamic list under optimistic concurrency: the write only
    /// lands when the row's `revision` still matches `expected_revision`.
    /// Returns `None` on a revision mismatch so the caller can re-read and
    /// retry.
    pub async fn update_dynamic_list(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        kind: DynamicKind,
        list: &[DynamicFileEntry],
        expected_revision: i64,
    ) -> Result<Option<CourseFileAggregate>, AppError> {
        let col = kind.column();
        let sql = format!(
            r#"
            UPDATE course_files
            SET {col} = $3, status = 'PENDING', revision = revision + 1, updated_at = NOW()
            WHERE course_id = $1 AND submitter_id = $2 AND revision = $4
            RETURNING {columns}
            "#,
            col = col,
            columns = AGGREGATE_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(course_id)
            .bind(submitter_id)
            .bind(serde_json::to_value(list)?)
            .bind(expected_revision)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_aggregate(&r)).transpose().map_err(Into::into)
    }

    /// Create a fresh aggregate carrying one dynamic list. Returns `None`
    /// when the aggregate already exists (caller falls back to the CAS
    /// update path).
    pub async fn create_with_dynamic_list(
        &self,
        course_id: Uuid,
        submitter_id: Uuid,
        kind: DynamicKind,
        list: &[DynamicFileEntry],
    ) -> Result<Option<CourseFileAggregate>, AppError> {
        let col = kind.column();
        let sql = format!(
            r#"
            INSERT INTO course_files (course_id, submitter_id, status, {col})
            VALUES ($1, $2, 'PENDING', $3)
            ON CONFLICT (course_id, submitter_id) DO NOTHING
            RETURNING {columns}
            "#,
            col = col,
            columns = AGGREGATE_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(course_id)
            .bind(submitter_id)
            .bind(serde_json::to_value(list)?)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_aggregate(&r)).transpose().map_err(Into::into)
    }

    /// Delete an aggregate and, via cascade, its exam records.
    pub async fn delete(&self, aggregate_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM course_files WHERE id = $1")
            .bind(aggregate_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
