use chrono::{DateTime, Utc};
use coursevault_core::models::Template;
use coursevault_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const TEMPLATE_COLUMNS: &str = "id, name, description, is_required, file_types, \
     max_size, status, created_by, created_at, updated_at";

fn row_to_template(row: &PgRow) -> Result<Template, sqlx::Error> {
    Ok(Template {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_required: row.try_get("is_required")?,
        file_types: row.try_get::<Vec<String>, _>("file_types")?,
        max_size: row.try_get("max_size")?,
        status: row.try_get("status")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Fields accepted when creating or editing a validation template.
#[derive(Debug, Clone)]
pub struct TemplateDraft {
    pub name: String,
    pub description: Option<String>,
    pub is_required: bool,
    pub file_types: Vec<String>,
    pub max_size: Option<i64>,
}

/// Repository for administrator-defined validation templates.
#[derive(Clone)]
pub struct TemplateRepository {
    pool: PgPool,
}

impl TemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, template_id: Uuid) -> Result<Option<Template>, AppError> {
        let sql = format!("SELECT {} FROM file_templates WHERE id = $1", TEMPLATE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(template_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_template(&r)).transpose().map_err(Into::into)
    }

    pub async fn list(&self, only_active: bool) -> Result<Vec<Template>, AppError> {
        let sql = if only_active {
            format!(
                "SELECT {} FROM file_templates WHERE status = TRUE ORDER BY name",
                TEMPLATE_COLUMNS
            )
        } else {
            format!("SELECT {} FROM file_templates ORDER BY name", TEMPLATE_COLUMNS)
        };
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(row_to_template)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub async fn create(
        &self,
        draft: &TemplateDraft,
        created_by: Uuid,
    ) -> Result<Template, AppError> {
        let sql = format!(
            r#"
            INSERT INTO file_templates
                (name, description, is_required, file_types, max_size, status, created_by)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6)
            RETURNING {columns}
            "#,
            columns = TEMPLATE_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(draft.is_required)
            .bind(&draft.file_types)
            .bind(draft.max_size)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?;

        Ok(row_to_template(&row)?)
    }

    pub async fn update(
        &self,
        template_id: Uuid,
        draft: &TemplateDraft,
    ) -> Result<Template, AppError> {
        let sql = format!(
            r#"
            UPDATE file_templates
            SET name = $2, description = $3, is_required = $4, file_types = $5,
                max_size = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {columns}
            "#,
            columns = TEMPLATE_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(template_id)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(draft.is_required)
            .bind(&draft.file_types)
            .bind(draft.max_size)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::TemplateNotFound(template_id.to_string()))?;

        Ok(row_to_template(&row)?)
    }

    /// Toggle a template active/inactive without touching its policy fields.
    pub async fn set_status(&self, template_id: Uuid, status: bool) -> Result<Template, AppError> {
        let sql = format!(
            r#"
            UPDATE file_templates
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {columns}
            "#,
            columns = TEMPLATE_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(template_id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::TemplateNotFound(template_id.to_string()))?;

        Ok(row_to_template(&row)?)
    }

    pub async fn delete(&self, template_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM file_templates WHERE id = $1")
            .bind(template_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
