use crate::auth::{AuthUser, MaybeUser};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::{ListRequest, MaterialDownload, MaterialPage};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studyhub_core::models::{MaterialPatch, MaterialResponse, Pagination};
use studyhub_core::AppError;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaterialDataResponse {
    pub data: MaterialResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaterialMessageResponse {
    pub message: String,
    pub data: MaterialResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Multipart body accepted by the upload endpoint.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadMaterialForm {
    /// PDF, PPT/PPTX, DOC/DOCX or plain text
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub subject: String,
    pub course: Option<String>,
    pub semester: Option<String>,
    pub description: Option<String>,
}

/// Listing query. Numbers are parsed leniently: junk falls back to the defaults.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListMaterialsQuery {
    /// Page number, from 1
    pub page: Option<String>,
    /// Page size, 1 to 100 (default 20)
    pub limit: Option<String>,
    pub course: Option<String>,
    pub semester: Option<String>,
    pub subject: Option<String>,
    /// Free-text search over subject, description, course and file name
    pub q: Option<String>,
    /// `true` groups the page by course
    pub group: Option<String>,
}

fn lenient_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

fn flag(value: Option<&str>) -> bool {
    value
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1"))
        .unwrap_or(false)
}

impl From<ListMaterialsQuery> for ListRequest {
    fn from(query: ListMaterialsQuery) -> Self {
        ListRequest {
            pagination: Pagination::from_request(
                lenient_number(query.page.as_deref()),
                lenient_number(query.limit.as_deref()),
            ),
            group_by_course: flag(query.group.as_deref()),
            course: query.course,
            semester: query.semester,
            subject: query.subject,
            q: query.q,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/materials",
    tag = "materials",
    request_body(content = UploadMaterialForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Material uploaded", body = MaterialMessageResponse),
        (status = 400, description = "Missing file or subject", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Uploads restricted to administrators", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "File type not allowed", body = ErrorResponse),
        (status = 500, description = "Upload failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, multipart),
    fields(user_id = %user.user_id, operation = "upload_material")
)]
pub async fn upload_material(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    // Refuse before reading the body.
    state.materials.authorize_upload(&user)?;

    let staged = state.intake.receive(multipart).await?;
    let material = state.materials.create(user, staged).await?;

    Ok((
        StatusCode::CREATED,
        Json(MaterialMessageResponse {
            message: "Uploaded".to_string(),
            data: material.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/materials",
    tag = "materials",
    params(ListMaterialsQuery),
    responses(
        (status = 200, description = "One page of materials", body = MaterialPage),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_materials(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListMaterialsQuery>,
) -> Result<Json<MaterialPage>, HttpAppError> {
    let page = state.materials.list(query.into()).await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/materials/{id}",
    tag = "materials",
    params(("id" = String, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Material metadata", body = MaterialDataResponse),
        (status = 404, description = "Material not found", body = ErrorResponse)
    )
)]
pub async fn get_material(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MaterialDataResponse>, HttpAppError> {
    let material = state.materials.get_one(&id).await?;
    Ok(Json(MaterialDataResponse {
        data: material.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/materials/{id}/download",
    tag = "materials",
    params(("id" = String, Path, description = "Material ID")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 302, description = "Redirect to a time-limited signed URL"),
        (status = 401, description = "Downloads require authentication", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Material not found", body = ErrorResponse),
        (status = 410, description = "File missing from storage", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, requester),
    fields(material_id = %id, operation = "download_material")
)]
pub async fn download_material(
    State(state): State<Arc<AppState>>,
    MaybeUser(requester): MaybeUser,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    match state.materials.download(&id, requester).await? {
        MaterialDownload::Redirect { url } => Ok((
            StatusCode::FOUND,
            [
                (header::LOCATION, url),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
        )
            .into_response()),
        MaterialDownload::Stream {
            body,
            content_length,
            content_type,
            content_disposition,
        } => {
            let body_stream = body.map(|result| {
                result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
            });

            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_DISPOSITION, content_disposition)
                .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
            if let Some(length) = content_length {
                builder = builder.header(header::CONTENT_LENGTH, length);
            }

            let response = builder
                .body(Body::from_stream(body_stream))
                .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;
            Ok(response)
        }
    }
}

#[utoipa::path(
    patch,
    path = "/api/materials/{id}",
    tag = "materials",
    params(("id" = String, Path, description = "Material ID")),
    request_body = MaterialPatch,
    responses(
        (status = 200, description = "Material updated", body = MaterialMessageResponse),
        (status = 400, description = "Invalid metadata", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Material not found", body = ErrorResponse)
    )
)]
pub async fn update_material(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(patch): ValidatedJson<MaterialPatch>,
) -> Result<Json<MaterialMessageResponse>, HttpAppError> {
    let material = state.materials.update_metadata(&id, user, patch).await?;
    Ok(Json(MaterialMessageResponse {
        message: "Updated".to_string(),
        data: material.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/materials/{id}",
    tag = "materials",
    params(("id" = String, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Material deleted", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Material not found", body = ErrorResponse)
    )
)]
pub async fn delete_material(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    state.materials.delete(&id, user).await?;
    Ok(Json(MessageResponse {
        message: "Deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>, group: Option<&str>) -> ListRequest {
        ListMaterialsQuery {
            page: page.map(String::from),
            limit: limit.map(String::from),
            group: group.map(String::from),
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn paging_is_lenient() {
        let request = query(Some("abc"), Some("xyz"), None);
        assert_eq!(request.pagination, Pagination { page: 1, limit: 20 });

        let request = query(Some("-4"), Some("0"), None);
        assert_eq!(request.pagination, Pagination { page: 1, limit: 20 });

        let request = query(Some("3"), Some("500"), None);
        assert_eq!(request.pagination, Pagination { page: 3, limit: 100 });
    }

    #[test]
    fn group_flag() {
        assert!(query(None, None, Some("true")).group_by_course);
        assert!(query(None, None, Some("1")).group_by_course);
        assert!(!query(None, None, Some("no")).group_by_course);
        assert!(!query(None, None, None).group_by_course);
    }
}
