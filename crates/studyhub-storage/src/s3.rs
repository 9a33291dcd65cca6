use crate::keys::generate_key;
use crate::traits::{
    BlobHint, BlobStore, DeleteOutcome, DownloadTarget, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{Attribute, Attributes, ObjectStore, ObjectStoreExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// S3-compatible blob store
///
/// Downloads are never proxied: clients get a presigned GET URL. The
/// `Content-Type` and `Content-Disposition` recorded at upload time are what
/// the bucket serves back through that URL.
#[derive(Clone)]
pub struct S3BlobStore {
    store: Arc<AmazonS3>,
    bucket: String,
    signed_url_expiry: Duration,
}

impl S3BlobStore {
    /// Create a new S3BlobStore
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `signed_url_expiry` - Lifetime of presigned download URLs
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        signed_url_expiry: Duration,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3BlobStore {
            store: Arc::new(store),
            bucket,
            signed_url_expiry,
        })
    }

    fn attributes(hint: &BlobHint) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, hint.content_type.clone().into());
        attributes.insert(
            Attribute::ContentDisposition,
            hint.content_disposition.clone().into(),
        );
        attributes
    }

    /// Returns `Ok(false)` when the object does not exist.
    async fn exists(&self, location: &Path) -> StorageResult<bool> {
        match self.store.head(location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, source: &std::path::Path, hint: &BlobHint) -> StorageResult<String> {
        let key = generate_key(&hint.extension);
        let location = Path::from(key.clone());
        let start = std::time::Instant::now();

        let mut input = tokio::fs::File::open(source).await?;
        let store: Arc<dyn ObjectStore> = self.store.clone();
        let mut writer = BufWriter::new(store, location).with_attributes(Self::attributes(hint));

        let written = match tokio::io::copy(&mut input, &mut writer).await {
            Ok(written) => writer.shutdown().await.map(|_| written),
            Err(e) => Err(e),
        };

        match written {
            Ok(size) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload successful"
                );
                Ok(key)
            }
            Err(e) => {
                if let Err(abort) = writer.abort().await {
                    tracing::warn!(
                        error = %abort,
                        bucket = %self.bucket,
                        key = %key,
                        "Failed to abort S3 multipart upload"
                    );
                }
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                Err(StorageError::UploadFailed(e.to_string()))
            }
        }
    }

    async fn resolve_download_target(
        &self,
        stored_reference: &str,
        _original_name: &str,
        _mime_type: &str,
    ) -> StorageResult<DownloadTarget> {
        let location = Path::parse(stored_reference)
            .map_err(|e| StorageError::AccessDenied(e.to_string()))?;

        if !self.exists(&location).await? {
            return Err(StorageError::NotFound(stored_reference.to_string()));
        }

        let url = self
            .store
            .signed_url(Method::GET, &location, self.signed_url_expiry)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        tracing::debug!(
            bucket = %self.bucket,
            key = %stored_reference,
            expires_in_secs = self.signed_url_expiry.as_secs(),
            "Issued signed download URL"
        );

        Ok(DownloadTarget::SignedUrl {
            url,
            expires_in: self.signed_url_expiry,
        })
    }

    async fn delete(&self, stored_reference: &str) -> StorageResult<DeleteOutcome> {
        let start = std::time::Instant::now();
        let location = Path::parse(stored_reference)
            .map_err(|e| StorageError::AccessDenied(e.to_string()))?;

        // S3 deletes succeed for missing keys, so ask first.
        if !self.exists(&location).await? {
            return Ok(DeleteOutcome::NotFound);
        }

        self.store.delete(&location).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %stored_reference,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %stored_reference,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(DeleteOutcome::Deleted)
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.exists(&Path::from("materials/.health")).await.map(|_| ())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
