//! StudyHub Storage Library
//!
//! Blob storage for uploaded study materials. The [`BlobStore`] trait has a
//! local filesystem implementation and an S3-compatible one.
//!
//! # Reference format
//!
//! Every blob is stored under a freshly generated key:
//!
//! - `materials/{uuid}.{ext}`
//!
//! Keys never come from client input. References read back from the record
//! store are still checked before they touch the filesystem.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_blob_store;
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3BlobStore;
pub use studyhub_core::StorageBackend;
pub use traits::{
    BlobHint, BlobStore, BlobStream, DeleteOutcome, DownloadTarget, StorageError, StorageResult,
};
