use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use studyhub_core::models::{
    Material, MaterialFilter, MaterialMetadata, NewMaterial, Pagination, SearchQuery,
};
use studyhub_core::AppError;
use uuid::Uuid;

use super::material::MaterialRepository;

const MATERIAL_COLUMNS: &str = "id, course, semester, subject, description, original_name, \
     stored_reference, mime_type, size_bytes, uploaded_by, created_at, updated_at";

/// Escapes `\`, `%` and `_` so user text is matched literally by `ILIKE ... ESCAPE '\'`.
pub fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// WHERE clause for `filter` and the text values to bind to it, in order.
fn where_clause(filter: &MaterialFilter) -> (String, Vec<String>) {
    let mut where_parts: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    let mut param_index = 1;

    if let Some(course) = &filter.course {
        where_parts.push(format!("course = ${}", param_index));
        binds.push(course.clone());
        param_index += 1;
    }
    if let Some(semester) = &filter.semester {
        where_parts.push(format!("semester = ${}", param_index));
        binds.push(semester.clone());
        param_index += 1;
    }
    if let Some(subject) = &filter.subject {
        where_parts.push(format!("subject = ${}", param_index));
        binds.push(subject.clone());
        param_index += 1;
    }

    match &filter.query {
        Some(SearchQuery::FullText(text)) => {
            where_parts.push(format!(
                "search_vector @@ plainto_tsquery('simple', ${})",
                param_index
            ));
            binds.push(text.clone());
        }
        Some(SearchQuery::Substring(text)) => {
            let columns = ["subject", "description", "course", "original_name"];
            let ors: Vec<String> = columns
                .iter()
                .map(|column| format!("{} ILIKE ${} ESCAPE '\\'", column, param_index))
                .collect();
            where_parts.push(format!("({})", ors.join(" OR ")));
            binds.push(format!("%{}%", escape_like(text)));
        }
        None => {}
    }

    if where_parts.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", where_parts.join(" AND ")), binds)
    }
}

/// sqlx-backed material store
#[derive(Clone)]
pub struct PgMaterialRepository {
    pool: PgPool,
    full_text: bool,
}

impl PgMaterialRepository {
    /// `full_text` selects tsvector search; when false callers ask for ILIKE matching instead.
    pub fn new(pool: PgPool, full_text: bool) -> Self {
        Self { pool, full_text }
    }
}

#[async_trait]
impl MaterialRepository for PgMaterialRepository {
    #[tracing::instrument(skip(self, material), fields(db.table = "materials", db.operation = "insert"))]
    async fn insert(&self, material: NewMaterial) -> Result<Material, AppError> {
        let query = format!(
            "INSERT INTO materials (id, course, semester, subject, description, original_name, \
             stored_reference, mime_type, size_bytes, uploaded_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW()) \
             RETURNING {}",
            MATERIAL_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, Material>(&query)
            .bind(Uuid::new_v4())
            .bind(&material.metadata.course)
            .bind(&material.metadata.semester)
            .bind(&material.metadata.subject)
            .bind(&material.metadata.description)
            .bind(&material.original_name)
            .bind(&material.stored_reference)
            .bind(&material.mime_type)
            .bind(material.size_bytes)
            .bind(material.uploaded_by)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(material_id = %row.id, "Material record created");
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "materials", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Material>, AppError> {
        let query = format!("SELECT {} FROM materials WHERE id = $1", MATERIAL_COLUMNS);
        let row = sqlx::query_as::<Postgres, Material>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self, metadata), fields(db.table = "materials", db.operation = "update", db.record_id = %id))]
    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: MaterialMetadata,
    ) -> Result<Option<Material>, AppError> {
        let query = format!(
            "UPDATE materials SET course = $2, semester = $3, subject = $4, description = $5, \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            MATERIAL_COLUMNS
        );
        let row = sqlx::query_as::<Postgres, Material>(&query)
            .bind(id)
            .bind(&metadata.course)
            .bind(&metadata.semester)
            .bind(&metadata.subject)
            .bind(&metadata.description)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "materials", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, filter), fields(db.table = "materials", db.operation = "select", page = pagination.page, limit = pagination.limit))]
    async fn list(
        &self,
        filter: &MaterialFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Material>, i64), AppError> {
        let (where_sql, binds) = where_clause(filter);
        let next = binds.len() + 1;

        let select_sql = format!(
            "SELECT {} FROM materials {} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            MATERIAL_COLUMNS,
            where_sql,
            next,
            next + 1
        );
        let mut select = sqlx::query_as::<Postgres, Material>(&select_sql);
        for value in &binds {
            select = select.bind(value);
        }
        let rows = select
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM materials {}", where_sql);
        let mut count = sqlx::query_scalar::<Postgres, i64>(&count_sql);
        for value in &binds {
            count = count.bind(value);
        }
        let total = count.fetch_one(&self.pool).await?;

        Ok((rows, total))
    }

    fn supports_full_text(&self) -> bool {
        self.full_text
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
