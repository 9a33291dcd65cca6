//! Application state shared by every handler.

use crate::auth::JwtValidator;
use crate::services::{MaterialService, UploadIntake};
use std::sync::Arc;
use studyhub_core::Config;

/// Everything a request handler may need, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub materials: Arc<MaterialService>,
    pub intake: Arc<UploadIntake>,
    pub jwt: Arc<JwtValidator>,
}

impl AppState {
    pub fn new(
        config: Config,
        materials: MaterialService,
        intake: UploadIntake,
        jwt: JwtValidator,
    ) -> Self {
        Self {
            config,
            materials: Arc::new(materials),
            intake: Arc::new(intake),
            jwt: Arc::new(jwt),
        }
    }
}
