use crate::keys::{generate_key, MATERIALS_PREFIX};
use crate::traits::{
    BlobHint, BlobStore, DeleteOutcome, DownloadTarget, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem blob store
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore rooted at `base_path`, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(base_path.join(MATERIALS_PREFIX))
            .await
            .map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;

        let base_path = fs::canonicalize(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        Ok(LocalBlobStore { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a reference to a path under the root without touching the filesystem.
    ///
    /// Only plain relative components are accepted. `..`, absolute paths and
    /// drive prefixes are refused outright.
    fn key_to_path(&self, stored_reference: &str) -> StorageResult<PathBuf> {
        if stored_reference.is_empty() {
            return Err(StorageError::AccessDenied("empty reference".to_string()));
        }

        let mut path = self.base_path.clone();
        for component in Path::new(stored_reference).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::AccessDenied(format!(
                        "reference escapes storage root: {}",
                        stored_reference
                    )));
                }
            }
        }

        if !path.starts_with(&self.base_path) || path == self.base_path {
            return Err(StorageError::AccessDenied(format!(
                "reference escapes storage root: {}",
                stored_reference
            )));
        }

        Ok(path)
    }

    /// Resolve symlinks and make sure the real file still lives under the root.
    async fn confine(&self, path: &Path, stored_reference: &str) -> StorageResult<PathBuf> {
        let canonical = match fs::canonicalize(path).await {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(stored_reference.to_string()));
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };

        if canonical.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::AccessDenied(format!(
                "reference resolves outside storage root: {}",
                stored_reference
            )));
        }

        Ok(canonical)
    }

    async fn write_blob(source: &Path, dest: &Path) -> std::io::Result<u64> {
        let mut input = fs::File::open(source).await?;
        let mut output = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await?;
        let written = tokio::io::copy(&mut input, &mut output).await?;
        output.flush().await?;
        output.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, source: &Path, hint: &BlobHint) -> StorageResult<String> {
        let key = generate_key(&hint.extension);
        let path = self.key_to_path(&key)?;
        let start = std::time::Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        match Self::write_blob(source, &path).await {
            Ok(size) => {
                tracing::info!(
                    path = %path.display(),
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage upload successful"
                );
                Ok(key)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    if cleanup.kind() != ErrorKind::NotFound {
                        tracing::warn!(
                            error = %cleanup,
                            path = %path.display(),
                            "Failed to remove partial blob"
                        );
                    }
                }
                tracing::error!(
                    error = %e,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage upload failed"
                );
                Err(StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    async fn resolve_download_target(
        &self,
        stored_reference: &str,
        _original_name: &str,
        _mime_type: &str,
    ) -> StorageResult<DownloadTarget> {
        let path = self.key_to_path(stored_reference)?;
        let canonical = self.confine(&path, stored_reference).await?;

        let file = fs::File::open(&canonical).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(stored_reference.to_string()),
            _ => StorageError::DownloadFailed(format!(
                "Failed to open file {}: {}",
                canonical.display(),
                e
            )),
        })?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(stored_reference.to_string()));
        }

        let key = stored_reference.to_string();
        let body = tokio_util::io::ReaderStream::new(file).map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(key = %key, error = %e, "Local storage stream download error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(DownloadTarget::Stream {
            body: Box::pin(body),
            content_length: Some(metadata.len()),
        })
    }

    async fn delete(&self, stored_reference: &str) -> StorageResult<DeleteOutcome> {
        let path = self.key_to_path(stored_reference)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(
                    path = %path.display(),
                    key = %stored_reference,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage delete successful"
                );
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.base_path).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StorageError::ConfigError(format!(
                "{} is not a directory",
                self.base_path.display()
            )))
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::tempdir;

    fn hint(ext: &str) -> BlobHint {
        BlobHint {
            extension: ext.to_string(),
            content_type: "application/pdf".to_string(),
            content_disposition: "attachment; filename=\"notes.pdf\"".to_string(),
        }
    }

    async fn staged(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("staged.tmp");
        fs::write(&path, bytes).await.unwrap();
        path
    }

    async fn collect(target: DownloadTarget) -> (Vec<u8>, Option<u64>) {
        match target {
            DownloadTarget::Stream {
                body,
                content_length,
            } => {
                let chunks: Vec<bytes::Bytes> = body.try_collect().await.unwrap();
                (chunks.concat(), content_length)
            }
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_then_resolve_streams_bytes() {
        let root = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let store = LocalBlobStore::new(root.path()).await.unwrap();

        let source = staged(scratch.path(), b"%PDF-1.4 lecture notes").await;
        let key = store.put(&source, &hint("pdf")).await.unwrap();

        assert!(key.starts_with("materials/"));
        assert!(key.ends_with(".pdf"));
        assert!(source.exists(), "put copies, the caller owns the temp file");

        let target = store
            .resolve_download_target(&key, "notes.pdf", "application/pdf")
            .await
            .unwrap();
        let (bytes, len) = collect(target).await;
        assert_eq!(bytes, b"%PDF-1.4 lecture notes");
        assert_eq!(len, Some(bytes.len() as u64));
    }

    #[tokio::test]
    async fn test_put_allocates_fresh_keys() {
        let root = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let store = LocalBlobStore::new(root.path()).await.unwrap();
        let source = staged(scratch.path(), b"same bytes").await;

        let a = store.put(&source, &hint("txt")).await.unwrap();
        let b = store.put(&source, &hint("txt")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_put_missing_source_leaves_nothing_behind() {
        let root = tempdir().unwrap();
        let store = LocalBlobStore::new(root.path()).await.unwrap();

        let result = store
            .put(Path::new("/definitely/not/here.tmp"), &hint("pdf"))
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));

        let mut entries = fs::read_dir(root.path().join(MATERIALS_PREFIX)).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let root = tempdir().unwrap();
        let store = LocalBlobStore::new(root.path()).await.unwrap();

        for reference in [
            "../../../etc/passwd",
            "materials/../../secret.pdf",
            "materials/../materials/x.pdf",
            "/etc/passwd",
            "",
        ] {
            let result = store
                .resolve_download_target(reference, "x.pdf", "application/pdf")
                .await;
            assert!(
                matches!(result, Err(StorageError::AccessDenied(_))),
                "{reference} should be denied"
            );
        }

        let result = store.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::AccessDenied(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_rejected() {
        let root = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let store = LocalBlobStore::new(root.path()).await.unwrap();

        let secret = outside.path().join("secret.txt");
        fs::write(&secret, b"top secret").await.unwrap();
        std::os::unix::fs::symlink(&secret, root.path().join("materials/link.txt")).unwrap();

        let result = store
            .resolve_download_target("materials/link.txt", "link.txt", "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let root = tempdir().unwrap();
        let store = LocalBlobStore::new(root.path()).await.unwrap();

        let result = store
            .resolve_download_target("materials/gone.pdf", "gone.pdf", "application/pdf")
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let root = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let store = LocalBlobStore::new(root.path()).await.unwrap();
        let key = store
            .put(&staged(scratch.path(), b"bye").await, &hint("txt"))
            .await
            .unwrap();

        assert_eq!(store.delete(&key).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete(&key).await.unwrap(), DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_health_check() {
        let root = tempdir().unwrap();
        let store = LocalBlobStore::new(root.path()).await.unwrap();
        assert!(store.health_check().await.is_ok());
        assert_eq!(store.backend_type(), StorageBackend::Local);
    }
}
