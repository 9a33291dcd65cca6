//! Streaming upload intake
//!
//! extract → validate declared type → stream to temp file (size-checked) → collect metadata

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use studyhub_core::models::MaterialMetadata;
use studyhub_core::{AppError, MimeLookup};
use tokio::io::AsyncWriteExt;

use crate::utils::upload::{
    file_extension, normalize_mime_type, sanitize_display_name, temp_file_extension,
    validate_content_type, validate_file_extension, validate_file_size,
};
use crate::validation::validate_extension_content_type_match;

use super::types::{StagedUpload, TemporaryUpload, UploadLimits};

const OCTET_STREAM: &str = "application/octet-stream";

/// Receives one document per request and stages it in the temp directory.
pub struct UploadIntake {
    limits: UploadLimits,
    mime: Arc<dyn MimeLookup>,
}

#[derive(Default)]
struct FormFields {
    course: Option<String>,
    semester: Option<String>,
    subject: Option<String>,
    description: Option<String>,
}

impl UploadIntake {
    pub fn new(limits: UploadLimits, mime: Arc<dyn MimeLookup>) -> Self {
        Self { limits, mime }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Creates the private temp directory if it does not exist yet.
    pub async fn prepare(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.limits.temp_dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(
                &self.limits.temp_dir,
                std::fs::Permissions::from_mode(0o700),
            )
            .await?;
        }
        tracing::info!(temp_dir = %self.limits.temp_dir.display(), "Upload temp directory ready");
        Ok(())
    }

    /// Reads the whole multipart body.
    ///
    /// Exactly one file part is accepted. Fields named `course`, `semester`,
    /// `subject` and `description` become metadata; anything else is skipped.
    /// On any error the staged file, if one was written, is already gone.
    pub async fn receive(&self, mut multipart: Multipart) -> Result<StagedUpload, AppError> {
        let mut upload: Option<TemporaryUpload> = None;
        let mut fields = FormFields::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| self.multipart_error(e))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" || field.file_name().is_some() {
                if upload.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }
                upload = Some(self.stage_file(field).await?);
                continue;
            }

            let slot = match name.as_str() {
                "course" => &mut fields.course,
                "semester" => &mut fields.semester,
                "subject" => &mut fields.subject,
                "description" => &mut fields.description,
                _ => {
                    tracing::debug!(field = %name, "Ignoring unknown multipart field");
                    continue;
                }
            };
            *slot = Some(field.text().await.map_err(|e| self.multipart_error(e))?);
        }

        let upload =
            upload.ok_or_else(|| AppError::InvalidInput("File is required".to_string()))?;
        let metadata = MaterialMetadata::from_form(
            fields.course,
            fields.semester,
            fields.subject,
            fields.description,
        )?;

        Ok(StagedUpload { upload, metadata })
    }

    /// Validates the part's declared name and type, then streams it to disk.
    async fn stage_file(&self, mut field: Field<'_>) -> Result<TemporaryUpload, AppError> {
        let original_name = sanitize_display_name(field.file_name().unwrap_or_default());
        let extension = file_extension(&original_name);
        validate_file_extension(&extension, &self.limits.allowed_extensions)?;

        let declared = field
            .content_type()
            .map(normalize_mime_type)
            .filter(|ct| !ct.is_empty() && ct != OCTET_STREAM);
        let mime_type = match declared {
            Some(ct) => ct,
            None => self
                .mime
                .lookup(&original_name)
                .map(|ct| normalize_mime_type(&ct))
                .ok_or_else(|| {
                    AppError::UnsupportedMediaType(format!(
                        "Could not determine the type of '{}'",
                        original_name
                    ))
                })?,
        };
        validate_content_type(&mime_type, &self.limits.allowed_content_types)?;
        validate_extension_content_type_match(&extension, &mime_type)
            .map_err(AppError::UnsupportedMediaType)?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let (file, path) = tempfile::Builder::new()
            .prefix(&format!("{}-", millis))
            .suffix(&format!(".{}", temp_file_extension(&extension)))
            .rand_bytes(10)
            .tempfile_in(&self.limits.temp_dir)
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        // `path` removes the file if anything below returns early or this future is dropped.
        let mut size: usize = 0;
        while let Some(chunk) = field.chunk().await.map_err(|e| self.multipart_error(e))? {
            size = size.saturating_add(chunk.len());
            validate_file_size(size, self.limits.max_file_size)?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        tracing::debug!(
            original_name = %original_name,
            mime_type = %mime_type,
            size_bytes = size,
            "Upload staged"
        );

        Ok(TemporaryUpload::new(
            path,
            mime_type,
            original_name,
            size as u64,
            extension,
        ))
    }

    fn multipart_error(&self, err: MultipartError) -> AppError {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(format!(
                "File size exceeds maximum allowed size of {} MB",
                self.limits.max_file_size / 1024 / 1024
            ));
        }
        AppError::InvalidInput(format!("Failed to read multipart: {}", err.body_text()))
    }
}
