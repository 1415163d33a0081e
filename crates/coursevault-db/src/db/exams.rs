use chrono::{DateTime, Utc};
use coursevault_core::models::{ExamComponent, ExamRecord, ExamType, FileSlotValue};
use coursevault_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const EXAM_COLUMNS: &str = "id, course_files_id, exam_type, exam_number, \
     question, highest, average, marginal, is_completed, created_at, updated_at";

fn decode_error(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

fn decode_component(row: &PgRow, column: &str) -> Result<Option<FileSlotValue>, sqlx::Error> {
    let value: Option<serde_json::Value> = row.try_get(column)?;
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| decode_error(format!("invalid component value in '{}': {}", column, e)))
}

fn row_to_exam(row: &PgRow) -> Result<ExamRecord, sqlx::Error> {
    let exam_type: String = row.try_get("exam_type")?;
    let exam_type = ExamType::from_str_opt(&exam_type)
        .ok_or_else(|| decode_error(format!("unknown exam type '{}'", exam_type)))?;

    Ok(ExamRecord {
        id: row.try_get("id")?,
        course_files_id: row.try_get("course_files_id")?,
        exam_type,
        exam_number: row.try_get("exam_number")?,
        question: decode_component(row, "question")?,
        highest: decode_component(row, "highest")?,
        average: decode_component(row, "average")?,
        marginal: decode_component(row, "marginal")?,
        is_completed: row.try_get("is_completed")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Repository for per-exam component records.
///
/// One row per (aggregate, exam number); the exam type is stored alongside
/// and the four component columns are patched independently.
#[derive(Clone)]
pub struct ExamRepository {
    pool: PgPool,
}

impl ExamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        course_files_id: Uuid,
        exam_number: i32,
    ) -> Result<Option<ExamRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM course_exams WHERE course_files_id = $1 AND exam_number = $2",
            EXAM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(course_files_id)
            .bind(exam_number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_exam(&r)).transpose().map_err(Into::into)
    }

    pub async fn list_for_aggregate(
        &self,
        course_files_id: Uuid,
    ) -> Result<Vec<ExamRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM course_exams WHERE course_files_id = $1 \
             ORDER BY exam_type, exam_number",
            EXAM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(course_files_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(row_to_exam)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Upsert one component of an exam record. Only the addressed column is
    /// written; the exam type of an existing row is overwritten so a
    /// re-upload under a different type retargets the whole record.
    pub async fn upsert_component(
        &self,
        course_files_id: Uuid,
        exam_type: ExamType,
        exam_number: i32,
        component: ExamComponent,
        value: &FileSlotValue,
    ) -> Result<ExamRecord, AppError> {
        // Column name comes from a closed enum, never from client input.
        let col = component.as_str();
        let sql = format!(
            r#"
            INSERT INTO course_exams (course_files_id, exam_type, exam_number, {col})
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (course_files_id, exam_number)
            DO UPDATE SET {col} = EXCLUDED.{col}, exam_type = EXCLUDED.exam_type,
                          updated_at = NOW()
            RETURNING {columns}
            "#,
            col = col,
            columns = EXAM_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(course_files_id)
            .bind(exam_type.as_str())
            .bind(exam_number)
            .bind(serde_json::to_value(value)?)
            .fetch_one(&self.pool)
            .await?;

        Ok(row_to_exam(&row)?)
    }

    /// Recompute the completeness flag from the stored component columns and
    /// return the refreshed record.
    pub async fn recompute_completed(
        &self,
        course_files_id: Uuid,
        exam_number: i32,
    ) -> Result<ExamRecord, AppError> {
        let sql = format!(
            r#"
            UPDATE course_exams
            SET is_completed = (question IS NOT NULL AND highest IS NOT NULL
                                AND average IS NOT NULL AND marginal IS NOT NULL),
                updated_at = NOW()
            WHERE course_files_id = $1 AND exam_number = $2
            RETURNING {columns}
            "#,
            columns = EXAM_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(course_files_id)
            .bind(exam_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Exam {} for aggregate {} not found",
                    exam_number, course_files_id
                ))
            })?;

        Ok(row_to_exam(&row)?)
    }
}
