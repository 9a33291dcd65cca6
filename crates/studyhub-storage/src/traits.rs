//! Blob store abstraction
//!
//! This module defines the [`BlobStore`] trait that all storage backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    /// The reference resolves outside the storage root.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

pub type BlobStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// What the store may record alongside the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHint {
    /// Lower-cased extension without the dot, possibly empty.
    pub extension: String,
    pub content_type: String,
    pub content_disposition: String,
}

/// How a blob is handed back to the client.
pub enum DownloadTarget {
    /// Bytes served through this process.
    Stream {
        body: BlobStream,
        content_length: Option<u64>,
    },
    /// Time-limited URL the client is redirected to.
    SignedUrl { url: String, expires_in: Duration },
}

impl fmt::Debug for DownloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadTarget::Stream { content_length, .. } => f
                .debug_struct("Stream")
                .field("content_length", content_length)
                .finish_non_exhaustive(),
            DownloadTarget::SignedUrl { url, expires_in } => f
                .debug_struct("SignedUrl")
                .field("url", url)
                .field("expires_in", expires_in)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Blob storage abstraction
///
/// The material service is written only against this trait. References are
/// opaque to callers and always of the form `materials/{uuid}.{ext}`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Durably store the file at `source` under a fresh key and return the key.
    ///
    /// The blob is durable once this returns.
    async fn put(&self, source: &Path, hint: &BlobHint) -> StorageResult<String>;

    /// Work out how a stored blob should reach the client.
    ///
    /// Missing blobs are `NotFound`; references escaping the storage root are
    /// `AccessDenied`.
    async fn resolve_download_target(
        &self,
        stored_reference: &str,
        original_name: &str,
        mime_type: &str,
    ) -> StorageResult<DownloadTarget>;

    /// Remove a blob. A missing blob is an outcome, not an error.
    async fn delete(&self, stored_reference: &str) -> StorageResult<DeleteOutcome>;

    /// Cheap reachability probe used by `/health`.
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
