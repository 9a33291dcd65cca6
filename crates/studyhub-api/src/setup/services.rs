//! Service initialization and application state setup

use anyhow::Context;
use std::sync::Arc;
use studyhub_core::{AttachmentDisposition, Config, ExtensionMimeLookup, MimeLookup};
use studyhub_db::MaterialRepository;
use studyhub_storage::BlobStore;

use crate::auth::JwtValidator;
use crate::services::{MaterialPolicy, MaterialService, UploadIntake, UploadLimits};
use crate::state::AppState;

/// Wire the intake, the material service and the token validator together.
pub async fn initialize_services(
    config: &Config,
    records: Arc<dyn MaterialRepository>,
    blobs: Arc<dyn BlobStore>,
) -> Result<Arc<AppState>, anyhow::Error> {
    let mime: Arc<dyn MimeLookup> = Arc::new(ExtensionMimeLookup);

    let intake = UploadIntake::new(UploadLimits::from_config(config), mime.clone());
    intake
        .prepare()
        .await
        .context("Failed to prepare upload temp directory")?;

    let policy = MaterialPolicy {
        uploads_admin_only: config.uploads_admin_only(),
        downloads_require_auth: config.downloads_require_auth(),
    };
    let materials = MaterialService::new(
        records,
        blobs,
        mime,
        Arc::new(AttachmentDisposition),
        policy,
    );

    tracing::info!(
        uploads_admin_only = policy.uploads_admin_only,
        downloads_require_auth = policy.downloads_require_auth,
        max_file_mb = config.max_file_size_bytes() / 1024 / 1024,
        extensions = %config.allowed_extensions().join(","),
        "Material service initialized"
    );

    Ok(Arc::new(AppState::new(
        config.clone(),
        materials,
        intake,
        JwtValidator::new(config.jwt_secret()),
    )))
}
