//! Types produced by the upload intake

use std::io;
use std::path::{Path, PathBuf};

use studyhub_core::models::MaterialMetadata;
use studyhub_core::Config;
use tempfile::TempPath;

/// Size and type limits applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_file_size: usize,
    /// Lower-cased, without the leading dot
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
    pub temp_dir: PathBuf,
}

impl UploadLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes(),
            allowed_extensions: config.allowed_extensions().to_vec(),
            allowed_content_types: config.allowed_content_types().to_vec(),
            temp_dir: config.temp_upload_dir().to_path_buf(),
        }
    }
}

/// A validated file waiting in the temp directory.
///
/// The file is removed when this value is dropped, so every exit path of an
/// upload cleans up after itself. [`TemporaryUpload::close`] does the same
/// but reports a failed removal.
#[derive(Debug)]
pub struct TemporaryUpload {
    path: TempPath,
    /// Normalized, allow-listed MIME type
    pub mime_type: String,
    /// Sanitized client filename, for display only
    pub original_name: String,
    pub size_bytes: u64,
    /// Lower-cased, allow-listed extension
    pub extension: String,
}

impl TemporaryUpload {
    pub fn new(
        path: TempPath,
        mime_type: String,
        original_name: String,
        size_bytes: u64,
        extension: String,
    ) -> Self {
        Self {
            path,
            mime_type,
            original_name,
            size_bytes,
            extension,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the temp file now.
    pub fn close(self) -> io::Result<()> {
        self.path.close()
    }
}

/// What the intake hands to the material service.
#[derive(Debug)]
pub struct StagedUpload {
    pub upload: TemporaryUpload,
    pub metadata: MaterialMetadata,
}
