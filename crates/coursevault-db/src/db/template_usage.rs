use chrono::{DateTime, Utc};
use coursevault_core::models::TemplateUsage;
use coursevault_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const USAGE_COLUMNS: &str = "id, template_id, course_id, submitter_id, file_id, used_at";

fn row_to_usage(row: &PgRow) -> Result<TemplateUsage, sqlx::Error> {
    Ok(TemplateUsage {
        id: row.try_get("id")?,
        template_id: row.try_get("template_id")?,
        course_id: row.try_get("course_id")?,
        submitter_id: row.try_get("submitter_id")?,
        file_id: row.try_get("file_id")?,
        used_at: row.try_get::<DateTime<Utc>, _>("used_at")?,
    })
}

/// Append-only audit trail of templated uploads.
#[derive(Clone)]
pub struct TemplateUsageRepository {
    pool: PgPool,
}

impl TemplateUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        template_id: Uuid,
        course_id: Uuid,
        submitter_id: Uuid,
        file_id: Uuid,
    ) -> Result<TemplateUsage, AppError> {
        let sql = format!(
            r#"
            INSERT INTO template_usages (template_id, course_id, submitter_id, file_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {columns}
            "#,
            columns = USAGE_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(template_id)
            .bind(course_id)
            .bind(submitter_id)
            .bind(file_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row_to_usage(&row)?)
    }

    pub async fn usage_count(&self, template_id: Uuid) -> Result<i64, AppError> {
        let row =
            sqlx::query("SELECT COUNT(*) AS uses FROM template_usages WHERE template_id = $1")
                .bind(template_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.try_get::<i64, _>("uses")?)
    }

    pub async fn recent(
        &self,
        template_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TemplateUsage>, AppError> {
        let sql = format!(
            "SELECT {} FROM template_usages WHERE template_id = $1 \
             ORDER BY used_at DESC LIMIT $2",
            USAGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(template_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(row_to_usage)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}
