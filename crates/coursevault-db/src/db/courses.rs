use coursevault_core::AppError;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Minimal view over the courses table. The ingestion engine only needs to
/// know a course exists before accepting uploads against it.
#[derive(Clone)]
pub struct CourseRepository {
    pool: PgPool,
}

impl CourseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, course_id: Uuid) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1) AS present")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get::<bool, _>("present")?)
    }
}
