use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use studyhub_core::models::{Material, MaterialFilter, MaterialMetadata, NewMaterial, Pagination};
use studyhub_core::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::material::MaterialRepository;

/// Process-local material store for development and tests.
///
/// Has no text index, so free-text queries should be substring matches.
#[derive(Default)]
pub struct InMemoryMaterialRepository {
    records: RwLock<HashMap<Uuid, Material>>,
}

impl InMemoryMaterialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MaterialRepository for InMemoryMaterialRepository {
    async fn insert(&self, material: NewMaterial) -> Result<Material, AppError> {
        let now = Utc::now();
        let record = Material {
            id: Uuid::new_v4(),
            course: material.metadata.course,
            semester: material.metadata.semester,
            subject: material.metadata.subject,
            description: material.metadata.description,
            original_name: material.original_name,
            stored_reference: material.stored_reference,
            mime_type: material.mime_type,
            size_bytes: material.size_bytes,
            uploaded_by: material.uploaded_by,
            created_at: now,
            updated_at: now,
        };

        let mut records = self.records.write().await;
        if records
            .values()
            .any(|existing| existing.stored_reference == record.stored_reference)
        {
            return Err(AppError::Internal(format!(
                "stored reference already in use: {}",
                record.stored_reference
            )));
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Material>, AppError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: MaterialMetadata,
    ) -> Result<Option<Material>, AppError> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|record| {
            record.course = metadata.course;
            record.semester = metadata.semester;
            record.subject = metadata.subject;
            record.description = metadata.description;
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn list(
        &self,
        filter: &MaterialFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Material>, i64), AppError> {
        let records = self.records.read().await;
        let mut matching: Vec<&Material> = records.values().filter(|m| filter.matches(m)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(pagination.limit).unwrap_or(0))
            .cloned()
            .collect();

        Ok((page, total))
    }

    fn supports_full_text(&self) -> bool {
        false
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
