use async_trait::async_trait;
use studyhub_core::models::{Material, MaterialFilter, MaterialMetadata, NewMaterial, Pagination};
use studyhub_core::AppError;
use uuid::Uuid;

/// Persistent index of uploaded materials.
///
/// Listings are ordered by `created_at DESC, id DESC`.
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    async fn insert(&self, material: NewMaterial) -> Result<Material, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Material>, AppError>;

    /// Replaces the editable fields. Returns `None` when the record is gone.
    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: MaterialMetadata,
    ) -> Result<Option<Material>, AppError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// One page of matching records plus the total match count.
    async fn list(
        &self,
        filter: &MaterialFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Material>, i64), AppError>;

    /// Whether [`SearchQuery::FullText`](studyhub_core::models::SearchQuery) is backed by an index.
    fn supports_full_text(&self) -> bool;

    async fn health_check(&self) -> Result<(), AppError>;
}
