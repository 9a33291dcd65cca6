//! StudyHub Core Library
//!
//! Domain models, error types, configuration and the small capability
//! interfaces shared by the storage, database and API crates.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use capabilities::{
    AttachmentDisposition, DispositionFormatter, ExtensionMimeLookup, MimeLookup,
};
pub use config::{BaseConfig, Config, StudyHubConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
