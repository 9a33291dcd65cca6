//! Route configuration and setup.
//!
//! Health checks live in [health](health).

mod health;

use crate::api_doc;
use crate::auth::middleware::auth_middleware;
use crate::constants::{api_path, FORM_OVERHEAD_BYTES, HTTP_CONCURRENCY_LIMIT};
use crate::handlers::materials;
use crate::state::AppState;
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use studyhub_core::Config;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    let material_routes = material_routes().layer(axum::middleware::from_fn_with_state(
        state.jwt.clone(),
        auth_middleware,
    ));

    let body_limit = config
        .max_file_size_bytes()
        .saturating_add(FORM_OVERHEAD_BYTES);
    tracing::info!(
        http_concurrency_limit = HTTP_CONCURRENCY_LIMIT,
        body_limit_bytes = body_limit,
        "HTTP limits enabled"
    );

    let app = material_routes
        .merge(public_routes())
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn material_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &api_path("/materials"),
            get(materials::list_materials).post(materials::upload_material),
        )
        .route(
            &api_path("/materials/{id}"),
            get(materials::get_material)
                .patch(materials::update_material)
                .delete(materials::delete_material),
        )
        .route(
            &api_path("/materials/{id}/download"),
            get(materials::download_material),
        )
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route("/api/openapi.json", get(openapi_spec))
}

async fn openapi_spec() -> impl IntoResponse {
    Json(api_doc::get_openapi_spec())
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .context("CORS_ORIGINS contains an invalid origin")?;
        // Credentials so the `token` cookie is sent cross-origin.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };
    Ok(cors)
}
