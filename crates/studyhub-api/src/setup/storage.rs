//! Storage setup and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use studyhub_core::Config;
use studyhub_storage::{create_blob_store, BlobStore};

/// Build the configured blob store and make sure it is reachable.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn BlobStore>> {
    tracing::info!("Initializing blob storage...");
    let blobs = create_blob_store(config)
        .await
        .context("Failed to initialize blob storage")?;

    if let Err(e) = blobs.health_check().await {
        // Not fatal; /health keeps reporting it.
        tracing::warn!(error = %e, "Blob storage health check failed at startup");
    }

    tracing::info!(
        backend = %blobs.backend_type(),
        "Blob storage initialized successfully"
    );
    Ok(blobs)
}
