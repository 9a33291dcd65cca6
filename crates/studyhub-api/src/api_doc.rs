//! OpenAPI documentation.
//!
//! Served as JSON at `/api/openapi.json` and rendered by RapiDoc at `/docs`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services;
use studyhub_core::models;

/// Returns the OpenAPI document for the materials API.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StudyHub API",
        version = "0.1.0",
        description = "Upload, browse and download college study materials (notes, slides, papers). Files are kept in local or S3-compatible storage; metadata is searchable by course, semester and subject."
    ),
    paths(
        handlers::materials::upload_material,
        handlers::materials::list_materials,
        handlers::materials::get_material,
        handlers::materials::download_material,
        handlers::materials::update_material,
        handlers::materials::delete_material,
    ),
    components(
        schemas(
            models::MaterialResponse,
            models::MaterialPatch,
            models::CourseGroup,
            services::MaterialPage,
            services::MaterialListData,
            handlers::materials::MaterialDataResponse,
            handlers::materials::MaterialMessageResponse,
            handlers::materials::MessageResponse,
            handlers::materials::UploadMaterialForm,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "materials", description = "Study material upload, listing, download and management")
    )
)]
pub struct ApiDoc;
