//! Material service
//!
//! Orchestrates staged uploads, the blob store and the record store. Every
//! operation runs authorization, then orchestration, then error translation.
//! Nothing here depends on HTTP types.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use studyhub_core::models::{
    group_by_course, CourseGroup, Identity, Material, MaterialFilter, MaterialMetadata,
    MaterialPatch, MaterialResponse, NewMaterial, Pagination, SearchQuery,
};
use studyhub_core::{AppError, DispositionFormatter, MimeLookup};
use studyhub_db::MaterialRepository;
use studyhub_storage::{BlobHint, BlobStore, BlobStream, DeleteOutcome, DownloadTarget, StorageError};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::storage_to_app_error;
use crate::services::upload::{StagedUpload, TemporaryUpload};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Access rules that vary per deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialPolicy {
    pub uploads_admin_only: bool,
    pub downloads_require_auth: bool,
}

/// Listing parameters after query parsing.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub course: Option<String>,
    pub semester: Option<String>,
    pub subject: Option<String>,
    pub q: Option<String>,
    pub pagination: Pagination,
    pub group_by_course: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum MaterialListData {
    Items(Vec<MaterialResponse>),
    Groups(Vec<CourseGroup>),
}

/// One page of materials.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialPage {
    pub data: MaterialListData,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// How a download is answered.
pub enum MaterialDownload {
    Redirect {
        url: String,
    },
    Stream {
        body: BlobStream,
        content_length: Option<u64>,
        content_type: String,
        content_disposition: String,
    },
}

pub struct MaterialService {
    records: Arc<dyn MaterialRepository>,
    blobs: Arc<dyn BlobStore>,
    mime: Arc<dyn MimeLookup>,
    disposition: Arc<dyn DispositionFormatter>,
    policy: MaterialPolicy,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn not_found() -> AppError {
    AppError::NotFound("Material not found".to_string())
}

impl MaterialService {
    pub fn new(
        records: Arc<dyn MaterialRepository>,
        blobs: Arc<dyn BlobStore>,
        mime: Arc<dyn MimeLookup>,
        disposition: Arc<dyn DispositionFormatter>,
        policy: MaterialPolicy,
    ) -> Self {
        Self {
            records,
            blobs,
            mime,
            disposition,
            policy,
        }
    }

    /// Whether `caller` may upload at all. Checked before the body is read and again in `create`.
    pub fn authorize_upload(&self, caller: &Identity) -> Result<(), AppError> {
        if self.policy.uploads_admin_only && !caller.is_admin() {
            tracing::debug!(user_id = %caller.user_id, "Non-admin upload refused");
            return Err(AppError::Forbidden(
                "Only administrators can upload materials".to_string(),
            ));
        }
        Ok(())
    }

    /// Promotes a staged upload into a blob plus a record owned by `caller`.
    ///
    /// The temp file is removed whatever the outcome.
    #[tracing::instrument(skip(self, staged), fields(user_id = %caller.user_id))]
    pub async fn create(
        &self,
        caller: Identity,
        staged: StagedUpload,
    ) -> Result<Material, AppError> {
        let StagedUpload { upload, metadata } = staged;

        let outcome = match self.authorize_upload(&caller) {
            Ok(()) => self.promote(caller, &upload, metadata).await,
            Err(e) => Err(e),
        };

        let temp_path = upload.path().to_path_buf();
        if let Err(e) = upload.close() {
            tracing::warn!(error = %e, path = %temp_path.display(), "Failed to remove temp upload");
        }

        outcome
    }

    async fn promote(
        &self,
        caller: Identity,
        upload: &TemporaryUpload,
        metadata: MaterialMetadata,
    ) -> Result<Material, AppError> {
        let start = Instant::now();
        let hint = BlobHint {
            extension: upload.extension.clone(),
            content_type: upload.mime_type.clone(),
            content_disposition: self.disposition.attachment(&upload.original_name),
        };

        let stored_reference = self.blobs.put(upload.path(), &hint).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to store blob");
            AppError::UploadFailed(format!("Failed to store file: {}", e))
        })?;

        let new_material = NewMaterial {
            metadata,
            original_name: upload.original_name.clone(),
            stored_reference: stored_reference.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: i64::try_from(upload.size_bytes).unwrap_or(i64::MAX),
            uploaded_by: caller.user_id,
        };

        match self.records.insert(new_material).await {
            Ok(material) => {
                tracing::info!(
                    material_id = %material.id,
                    key = %stored_reference,
                    size_bytes = material.size_bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Material uploaded"
                );
                Ok(material)
            }
            Err(e) => {
                tracing::error!(error = %e, key = %stored_reference, "Failed to persist material record");
                if let Err(cleanup) = self.blobs.delete(&stored_reference).await {
                    tracing::error!(
                        error = %cleanup,
                        key = %stored_reference,
                        "Failed to remove orphaned blob"
                    );
                }
                Err(AppError::UploadFailed(format!("Failed to save material: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self, request), fields(page = request.pagination.page, limit = request.pagination.limit))]
    pub async fn list(&self, request: ListRequest) -> Result<MaterialPage, AppError> {
        let query = non_blank(request.q).map(|text| {
            if self.records.supports_full_text() {
                SearchQuery::FullText(text)
            } else {
                SearchQuery::Substring(text)
            }
        });
        let filter = MaterialFilter {
            course: non_blank(request.course),
            semester: non_blank(request.semester),
            subject: non_blank(request.subject),
            query,
        };
        let pagination = request.pagination;

        let (items, total) = self.records.list(&filter, pagination).await?;
        let items: Vec<MaterialResponse> = items.into_iter().map(Into::into).collect();
        let data = if request.group_by_course {
            MaterialListData::Groups(group_by_course(items))
        } else {
            MaterialListData::Items(items)
        };

        Ok(MaterialPage {
            data,
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: pagination.total_pages(total),
        })
    }

    /// Looks a material up by its textual id. Malformed ids are simply not found.
    pub async fn get_one(&self, id: &str) -> Result<Material, AppError> {
        let id = Uuid::parse_str(id.trim()).map_err(|_| not_found())?;
        self.records.get(id).await?.ok_or_else(not_found)
    }

    #[tracing::instrument(skip(self, requester), fields(material_id = %id))]
    pub async fn download(
        &self,
        id: &str,
        requester: Option<Identity>,
    ) -> Result<MaterialDownload, AppError> {
        if self.policy.downloads_require_auth && requester.is_none() {
            return Err(AppError::Unauthorized(
                "Authentication required to download materials".to_string(),
            ));
        }

        let material = self.get_one(id).await?;
        let target = self
            .blobs
            .resolve_download_target(
                &material.stored_reference,
                &material.original_name,
                &material.mime_type,
            )
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => {
                    tracing::warn!(key = %material.stored_reference, "Blob missing for material");
                    AppError::Gone("File missing from server".to_string())
                }
                StorageError::AccessDenied(msg) => {
                    tracing::warn!(
                        security_event = "storage_escape",
                        key = %material.stored_reference,
                        "Stored reference resolves outside the storage root"
                    );
                    AppError::AccessDenied(msg)
                }
                other => storage_to_app_error(other),
            })?;

        Ok(match target {
            DownloadTarget::SignedUrl { url, expires_in } => {
                tracing::debug!(expires_in_secs = expires_in.as_secs(), "Redirecting to signed URL");
                MaterialDownload::Redirect { url }
            }
            DownloadTarget::Stream {
                body,
                content_length,
            } => MaterialDownload::Stream {
                body,
                content_length,
                content_type: self.content_type_for(&material),
                content_disposition: self.disposition.attachment(&material.original_name),
            },
        })
    }

    fn content_type_for(&self, material: &Material) -> String {
        let recorded = material.mime_type.trim();
        if !recorded.is_empty() {
            return recorded.to_string();
        }
        self.mime
            .lookup(&material.original_name)
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
    }

    async fn owned_material(&self, id: &str, requester: &Identity) -> Result<Material, AppError> {
        let material = self.get_one(id).await?;
        if !requester.is_owner_or_admin(&material) {
            tracing::warn!(
                material_id = %material.id,
                user_id = %requester.user_id,
                "Refused change to another user's material"
            );
            return Err(AppError::Forbidden(
                "You can only modify your own materials".to_string(),
            ));
        }
        Ok(material)
    }

    /// Applies `patch` to the editable fields. Owner or admin only.
    #[tracing::instrument(skip(self, requester, patch), fields(material_id = %id, user_id = %requester.user_id))]
    pub async fn update_metadata(
        &self,
        id: &str,
        requester: Identity,
        patch: MaterialPatch,
    ) -> Result<Material, AppError> {
        let material = self.owned_material(id, &requester).await?;
        let metadata = patch.apply(MaterialMetadata::of(&material))?;

        self.records
            .update_metadata(material.id, metadata)
            .await?
            .ok_or_else(not_found)
    }

    /// Removes the blob (best-effort) and then the record. Owner or admin only.
    #[tracing::instrument(skip(self, requester), fields(material_id = %id, user_id = %requester.user_id))]
    pub async fn delete(&self, id: &str, requester: Identity) -> Result<(), AppError> {
        let material = self.owned_material(id, &requester).await?;

        match self.blobs.delete(&material.stored_reference).await {
            Ok(DeleteOutcome::Deleted) => {}
            Ok(DeleteOutcome::NotFound) => {
                tracing::info!(key = %material.stored_reference, "Blob already absent on delete");
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %material.stored_reference, "Failed to delete blob");
            }
        }

        if !self.records.delete(material.id).await? {
            return Err(not_found());
        }
        tracing::info!(material_id = %material.id, "Material deleted");
        Ok(())
    }

    pub async fn records_health(&self) -> Result<(), AppError> {
        self.records.health_check().await
    }

    pub async fn storage_health(&self) -> Result<(), StorageError> {
        self.blobs.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use studyhub_core::models::UserRole;
    use studyhub_core::{AttachmentDisposition, ExtensionMimeLookup, StorageBackend};
    use studyhub_db::InMemoryMaterialRepository;
    use studyhub_storage::StorageResult;

    /// Blob store double that records calls and can be told to fail.
    #[derive(Default)]
    struct RecordingBlobStore {
        fail_put: bool,
        missing: bool,
        escaped: bool,
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlobStore for RecordingBlobStore {
        async fn put(&self, source: &Path, hint: &BlobHint) -> StorageResult<String> {
            assert!(source.exists(), "temp file must still exist during put");
            if self.fail_put {
                return Err(StorageError::UploadFailed("bucket unavailable".into()));
            }
            let key = format!("materials/{}.{}", Uuid::new_v4(), hint.extension);
            self.puts.lock().unwrap().push(key.clone());
            Ok(key)
        }

        async fn resolve_download_target(
            &self,
            stored_reference: &str,
            _original_name: &str,
            _mime_type: &str,
        ) -> StorageResult<DownloadTarget> {
            if self.missing {
                return Err(StorageError::NotFound(stored_reference.to_string()));
            }
            if self.escaped {
                return Err(StorageError::AccessDenied(stored_reference.to_string()));
            }
            Ok(DownloadTarget::SignedUrl {
                url: format!("https://bucket.example/{}?sig=abc", stored_reference),
                expires_in: Duration::from_secs(60),
            })
        }

        async fn delete(&self, stored_reference: &str) -> StorageResult<DeleteOutcome> {
            self.deletes.lock().unwrap().push(stored_reference.to_string());
            Ok(DeleteOutcome::Deleted)
        }

        async fn health_check(&self) -> StorageResult<()> {
            Ok(())
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::S3
        }
    }

    /// Record store whose inserts always fail.
    struct FailingRecords;

    #[async_trait]
    impl MaterialRepository for FailingRecords {
        async fn insert(&self, _material: NewMaterial) -> Result<Material, AppError> {
            Err(AppError::Internal("connection reset".into()))
        }
        async fn get(&self, _id: Uuid) -> Result<Option<Material>, AppError> {
            Ok(None)
        }
        async fn update_metadata(
            &self,
            _id: Uuid,
            _metadata: MaterialMetadata,
        ) -> Result<Option<Material>, AppError> {
            Ok(None)
        }
        async fn delete(&self, _id: Uuid) -> Result<bool, AppError> {
            Ok(false)
        }
        async fn list(
            &self,
            _filter: &MaterialFilter,
            _pagination: Pagination,
        ) -> Result<(Vec<Material>, i64), AppError> {
            Ok((Vec::new(), 0))
        }
        fn supports_full_text(&self) -> bool {
            false
        }
        async fn health_check(&self) -> Result<(), AppError> {
            Err(AppError::Internal("down".into()))
        }
    }

    fn service(
        records: Arc<dyn MaterialRepository>,
        blobs: Arc<dyn BlobStore>,
        policy: MaterialPolicy,
    ) -> MaterialService {
        MaterialService::new(
            records,
            blobs,
            Arc::new(ExtensionMimeLookup),
            Arc::new(AttachmentDisposition),
            policy,
        )
    }

    fn student() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role: UserRole::Student,
        }
    }

    fn admin() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
        }
    }

    fn staged(dir: &tempfile::TempDir, subject: &str) -> StagedUpload {
        let (file, path) = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile_in(dir.path())
            .unwrap()
            .into_parts();
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        drop(file);
        StagedUpload {
            upload: TemporaryUpload::new(
                path,
                "application/pdf".into(),
                "notes.pdf".into(),
                8,
                "pdf".into(),
            ),
            metadata: MaterialMetadata::from_form(Some("CSE".into()), None, Some(subject.into()), None)
                .unwrap(),
        }
    }

    fn is_empty(dir: &tempfile::TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let blobs = Arc::new(RecordingBlobStore::default());
        let svc = service(
            Arc::new(InMemoryMaterialRepository::new()),
            blobs.clone(),
            MaterialPolicy::default(),
        );
        let owner = student();

        let created = svc.create(owner, staged(&dir, "DBMS")).await.unwrap();
        assert!(is_empty(&dir));
        assert_eq!(created.uploaded_by, owner.user_id);
        assert_eq!(blobs.puts.lock().unwrap().as_slice(), [created.stored_reference.clone()]);

        let fetched = svc.get_one(&created.id.to_string()).await.unwrap();
        assert_eq!(fetched.subject, "DBMS");
        assert_eq!(fetched.original_name, "notes.pdf");
        assert_eq!(fetched.size_bytes, 8);
    }

    #[tokio::test]
    async fn failed_put_creates_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let records = Arc::new(InMemoryMaterialRepository::new());
        let svc = service(
            records.clone(),
            Arc::new(RecordingBlobStore {
                fail_put: true,
                ..Default::default()
            }),
            MaterialPolicy::default(),
        );

        let err = svc.create(student(), staged(&dir, "DBMS")).await.unwrap_err();
        assert!(matches!(err, AppError::UploadFailed(_)));
        assert!(records.is_empty().await);
        assert!(is_empty(&dir));
    }

    #[tokio::test]
    async fn failed_insert_removes_the_new_blob() {
        let dir = tempfile::TempDir::new().unwrap();
        let blobs = Arc::new(RecordingBlobStore::default());
        let svc = service(Arc::new(FailingRecords), blobs.clone(), MaterialPolicy::default());

        let err = svc.create(student(), staged(&dir, "DBMS")).await.unwrap_err();
        assert!(matches!(err, AppError::UploadFailed(_)));

        let puts = blobs.puts.lock().unwrap().clone();
        assert_eq!(puts.len(), 1);
        assert_eq!(blobs.deletes.lock().unwrap().as_slice(), puts.as_slice());
        assert!(is_empty(&dir));
    }

    #[tokio::test]
    async fn admin_only_uploads() {
        let dir = tempfile::TempDir::new().unwrap();
        let blobs = Arc::new(RecordingBlobStore::default());
        let svc = service(
            Arc::new(InMemoryMaterialRepository::new()),
            blobs.clone(),
            MaterialPolicy {
                uploads_admin_only: true,
                ..Default::default()
            },
        );

        let err = svc.create(student(), staged(&dir, "DBMS")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(blobs.puts.lock().unwrap().is_empty());
        assert!(is_empty(&dir));

        assert!(svc.create(admin(), staged(&dir, "DBMS")).await.is_ok());
    }

    #[tokio::test]
    async fn only_owner_or_admin_can_change_a_material() {
        let dir = tempfile::TempDir::new().unwrap();
        let blobs = Arc::new(RecordingBlobStore::default());
        let svc = service(
            Arc::new(InMemoryMaterialRepository::new()),
            blobs.clone(),
            MaterialPolicy::default(),
        );
        let owner = student();
        let created = svc.create(owner, staged(&dir, "DBMS")).await.unwrap();
        let id = created.id.to_string();

        let patch = MaterialPatch {
            subject: Some("Hacked".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_metadata(&id, student(), patch.clone()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(svc.delete(&id, student()).await, Err(AppError::Forbidden(_))));
        assert_eq!(svc.get_one(&id).await.unwrap(), created);

        let updated = svc
            .update_metadata(
                &id,
                admin(),
                MaterialPatch {
                    course: Some("".into()),
                    description: Some("Unit 3".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.course, "General");
        assert_eq!(updated.description.as_deref(), Some("Unit 3"));
        assert_eq!(updated.uploaded_by, owner.user_id);
        assert_eq!(updated.stored_reference, created.stored_reference);

        assert!(matches!(
            svc.update_metadata(
                &id,
                owner,
                MaterialPatch {
                    subject: Some("  ".into()),
                    ..Default::default()
                }
            )
            .await,
            Err(AppError::InvalidInput(_))
        ));

        svc.delete(&id, owner).await.unwrap();
        assert_eq!(
            blobs.deletes.lock().unwrap().as_slice(),
            [created.stored_reference.clone()]
        );
        assert!(matches!(svc.get_one(&id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn download_policy_and_blob_failures() {
        let dir = tempfile::TempDir::new().unwrap();
        let records = Arc::new(InMemoryMaterialRepository::new());
        let owner = student();
        let created = service(
            records.clone(),
            Arc::new(RecordingBlobStore::default()),
            MaterialPolicy::default(),
        )
        .create(owner, staged(&dir, "DBMS"))
        .await
        .unwrap();
        let id = created.id.to_string();

        let guarded = service(
            records.clone(),
            Arc::new(RecordingBlobStore::default()),
            MaterialPolicy {
                downloads_require_auth: true,
                ..Default::default()
            },
        );
        assert!(matches!(
            guarded.download("not-a-uuid", None).await,
            Err(AppError::Unauthorized(_))
        ));
        match guarded.download(&id, Some(owner)).await {
            Ok(MaterialDownload::Redirect { url }) => assert!(url.contains(&created.stored_reference)),
            _ => panic!("expected a redirect"),
        }

        let missing = service(
            records.clone(),
            Arc::new(RecordingBlobStore {
                missing: true,
                ..Default::default()
            }),
            MaterialPolicy::default(),
        );
        assert!(matches!(missing.download(&id, None).await, Err(AppError::Gone(_))));
        assert!(matches!(
            missing.download("not-a-uuid", None).await,
            Err(AppError::NotFound(_))
        ));

        let escaped = service(
            records,
            Arc::new(RecordingBlobStore {
                escaped: true,
                ..Default::default()
            }),
            MaterialPolicy::default(),
        );
        assert!(matches!(
            escaped.download(&id, None).await,
            Err(AppError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn list_picks_search_mode_and_groups() {
        let dir = tempfile::TempDir::new().unwrap();
        let svc = service(
            Arc::new(InMemoryMaterialRepository::new()),
            Arc::new(RecordingBlobStore::default()),
            MaterialPolicy::default(),
        );
        let owner = student();
        svc.create(owner, staged(&dir, "DBMS")).await.unwrap();
        svc.create(owner, staged(&dir, "Operating Systems")).await.unwrap();

        let page = svc
            .list(ListRequest {
                q: Some("  system ".into()),
                pagination: Pagination::from_request(None, Some(500)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.limit, 100);
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);

        let page = svc
            .list(ListRequest {
                group_by_course: true,
                ..Default::default()
            })
            .await
            .unwrap();
        match page.data {
            MaterialListData::Groups(groups) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].id, "cse");
                assert_eq!(groups[0].materials.len(), 2);
            }
            MaterialListData::Items(_) => panic!("expected groups"),
        }
    }

    #[tokio::test]
    async fn health_reports_each_dependency() {
        let svc = service(
            Arc::new(FailingRecords),
            Arc::new(RecordingBlobStore::default()),
            MaterialPolicy::default(),
        );
        assert!(svc.records_health().await.is_err());
        assert!(svc.storage_health().await.is_ok());
    }
}
