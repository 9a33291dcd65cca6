pub mod material;
pub mod upload;

pub use material::{
    ListRequest, MaterialDownload, MaterialListData, MaterialPage, MaterialPolicy, MaterialService,
};
pub use upload::{StagedUpload, TemporaryUpload, UploadIntake, UploadLimits};
