//! Test helpers: build the real router over in-memory records and a temp-dir blob store.
//!
//! Run from workspace root: `cargo test -p studyhub-api --test materials_test`.

#![allow(dead_code)]

pub mod auth;
pub mod fixtures;

use axum_test::TestServer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studyhub_api::constants;
use studyhub_api::setup::{routes, services};
use studyhub_core::{BaseConfig, Config, StorageBackend, StudyHubConfig};
use studyhub_db::{InMemoryMaterialRepository, MaterialRepository};
use studyhub_storage::{BlobStore, LocalBlobStore};
use tempfile::TempDir;

pub use auth::TEST_JWT_SECRET;

/// API path for tests (e.g. `/api/materials`).
pub fn api_path(path: &str) -> String {
    constants::api_path(path)
}

/// Knobs the tests flip; everything else uses the development defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestOptions {
    pub uploads_admin_only: bool,
    pub downloads_require_auth: bool,
    pub max_file_size_bytes: Option<usize>,
}

/// Test application: server plus the stores and directories it owns.
pub struct TestApp {
    pub server: TestServer,
    pub records: Arc<InMemoryMaterialRepository>,
    pub storage_dir: TempDir,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Directory the local blob store writes material blobs into.
    pub fn blob_dir(&self) -> PathBuf {
        self.storage_dir.path().join("materials")
    }

    pub fn blob_files(&self) -> Vec<PathBuf> {
        files_in(&self.blob_dir())
    }

    pub fn temp_files(&self) -> Vec<PathBuf> {
        files_in(self.temp_dir.path())
    }

    /// Deletes every stored blob behind the service's back.
    pub fn remove_blobs(&self) {
        for file in self.blob_files() {
            std::fs::remove_file(&file).expect("Failed to remove blob");
        }
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub fn create_test_config(storage_dir: &Path, temp_dir: &Path, options: TestOptions) -> Config {
    Config(Box::new(StudyHubConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            db_max_connections: 1,
            db_timeout_seconds: 5,
            jwt_secret: TEST_JWT_SECRET.to_string(),
            environment: "test".to_string(),
        },
        database_url: None,
        storage_backend: StorageBackend::Local,
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        aws_region: None,
        local_storage_path: Some(storage_dir.display().to_string()),
        temp_upload_dir: temp_dir.to_path_buf(),
        max_file_size_bytes: options.max_file_size_bytes.unwrap_or(50 * 1024 * 1024),
        allowed_extensions: ["pdf", "ppt", "pptx", "doc", "docx", "txt"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        allowed_content_types: [
            "application/pdf",
            "application/vnd.ms-powerpoint",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "application/msword",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "text/plain",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        signed_url_expiry_secs: 3600,
        uploads_admin_only: options.uploads_admin_only,
        downloads_require_auth: options.downloads_require_auth,
        full_text_search: false,
    }))
}

/// Setup test app with default options.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(TestOptions::default()).await
}

pub async fn setup_test_app_with(options: TestOptions) -> TestApp {
    let storage_dir = tempfile::tempdir().expect("Failed to create storage directory");
    let temp_dir = tempfile::tempdir().expect("Failed to create temp upload directory");

    let config = create_test_config(storage_dir.path(), temp_dir.path(), options);

    let records = Arc::new(InMemoryMaterialRepository::new());
    let blobs: Arc<dyn BlobStore> = Arc::new(
        LocalBlobStore::new(storage_dir.path())
            .await
            .expect("Failed to create local blob store"),
    );

    let state = services::initialize_services(
        &config,
        records.clone() as Arc<dyn MaterialRepository>,
        blobs,
    )
    .await
    .expect("Failed to initialize services");
    let router = routes::setup_routes(&config, state).expect("Failed to build router");

    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        records,
        storage_dir,
        temp_dir,
    }
}
