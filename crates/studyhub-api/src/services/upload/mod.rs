//! Upload intake: multipart parsing, validation and temp-file staging.

mod service;
mod types;

pub use service::UploadIntake;
pub use types::{StagedUpload, TemporaryUpload, UploadLimits};
