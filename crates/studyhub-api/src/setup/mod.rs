//! Application setup and initialization
//!
//! Everything main.rs needs to go from a loaded [`Config`] to a served router.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::Result;
use std::sync::Arc;
use studyhub_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry();
    crate::error::configure(!config.is_production());

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let records = database::setup_records(&config).await?;
    let blobs = storage::setup_storage(&config).await?;

    let state = services::initialize_services(&config, records, blobs).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
