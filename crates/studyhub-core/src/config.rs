//! Configuration module
//!
//! Settings are read once at startup from the process environment (optionally
//! seeded from a `.env` file) and handed to the storage factory, the upload
//! intake, the material service and the router.

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: usize = 50;
const SIGNED_URL_EXPIRY_SECS: u64 = 3600;
/// Longest expiry S3 accepts for a presigned GET (7 days).
pub const MAX_SIGNED_URL_EXPIRY_SECS: u64 = 604_800;
const MIN_JWT_SECRET_LEN: usize = 32;

const DEFAULT_ALLOWED_EXTENSIONS: &str = "pdf,ppt,pptx,doc,docx,txt";
const DEFAULT_ALLOWED_CONTENT_TYPES: &str = "application/pdf,\
application/vnd.ms-powerpoint,\
application/vnd.openxmlformats-officedocument.presentationml.presentation,\
application/msword,\
application/vnd.openxmlformats-officedocument.wordprocessingml.document,\
text/plain";

/// Settings shared by every binary in the workspace
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub environment: String,
}

/// Materials service configuration
#[derive(Clone, Debug)]
pub struct StudyHubConfig {
    pub base: BaseConfig,
    /// Absent outside production means the in-memory record store is used.
    pub database_url: Option<String>,
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // MinIO, DigitalOcean Spaces, etc.
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub temp_upload_dir: PathBuf,
    pub max_file_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
    pub signed_url_expiry_secs: u64,
    pub uploads_admin_only: bool,
    pub downloads_require_auth: bool,
    pub full_text_search: bool,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<StudyHubConfig>);

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_list(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `MAX_FILE_SIZE_MB` in bytes; `None` when the product does not fit in `usize`.
fn megabytes_to_bytes(mb: usize) -> Option<usize> {
    mb.checked_mul(1024)?.checked_mul(1024)
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

impl Config {
    fn inner(&self) -> &StudyHubConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = StudyHubConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    /// `S3_REGION` wins over `AWS_REGION`
    pub fn s3_region(&self) -> Option<&str> {
        self.inner()
            .s3_region
            .as_deref()
            .or(self.inner().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn temp_upload_dir(&self) -> &std::path::Path {
        &self.inner().temp_upload_dir
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.inner().max_file_size_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.inner().allowed_extensions
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.inner().allowed_content_types
    }

    pub fn signed_url_expiry_secs(&self) -> u64 {
        self.inner().signed_url_expiry_secs
    }

    pub fn uploads_admin_only(&self) -> bool {
        self.inner().uploads_admin_only
    }

    pub fn downloads_require_auth(&self) -> bool {
        self.inner().downloads_require_auth
    }

    pub fn full_text_search(&self) -> bool {
        self.inner().full_text_search
    }
}

impl StudyHubConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);
        let max_file_size_bytes = megabytes_to_bytes(max_file_size_mb).ok_or_else(|| {
            anyhow::anyhow!("MAX_FILE_SIZE_MB is too large: {}", max_file_size_mb)
        })?;

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let local_storage_path = env_opt("LOCAL_STORAGE_PATH").or_else(|| {
            (storage_backend == StorageBackend::Local).then(|| "./uploads".to_string())
        });

        let temp_upload_dir = env_opt("UPLOAD_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("studyhub-uploads"));

        let signed_url_expiry_secs = env::var("SIGNED_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| SIGNED_URL_EXPIRY_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("SIGNED_URL_EXPIRY_SECS must be a valid number"))?;

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            environment,
        };

        let config = StudyHubConfig {
            base,
            database_url: env_opt("DATABASE_URL"),
            storage_backend,
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION"),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            aws_region: env_opt("AWS_REGION"),
            local_storage_path,
            temp_upload_dir,
            max_file_size_bytes,
            allowed_extensions: env_list("ALLOWED_EXTENSIONS", DEFAULT_ALLOWED_EXTENSIONS),
            allowed_content_types: env_list(
                "ALLOWED_CONTENT_TYPES",
                DEFAULT_ALLOWED_CONTENT_TYPES,
            ),
            signed_url_expiry_secs,
            uploads_admin_only: env_flag("UPLOADS_ADMIN_ONLY", false),
            downloads_require_auth: env_flag("DOWNLOADS_REQUIRE_AUTH", false),
            full_text_search: env_flag("FULL_TEXT_SEARCH", true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            ));
        }

        let production = is_production_env(&self.base.environment);

        if production && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        match self.database_url.as_deref() {
            Some(url) if !url.starts_with("postgres://") && !url.starts_with("postgresql://") => {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
            None if production => {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be set in production; the in-memory store is for development only"
                ));
            }
            _ => {}
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }

        if self.allowed_extensions.is_empty() || self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_EXTENSIONS and ALLOWED_CONTENT_TYPES must not be empty"
            ));
        }

        if self.signed_url_expiry_secs == 0
            || self.signed_url_expiry_secs > MAX_SIGNED_URL_EXPIRY_SECS
        {
            return Err(anyhow::anyhow!(
                "SIGNED_URL_EXPIRY_SECS must be between 1 and {} (7 days)",
                MAX_SIGNED_URL_EXPIRY_SECS
            ));
        }

        // Validate storage backend configuration
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
