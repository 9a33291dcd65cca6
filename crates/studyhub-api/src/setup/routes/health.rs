//! Health check handlers and response types.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "healthy", "timeout" or "unhealthy".
///
/// Error text stays in the logs; it can carry storage paths or connection details.
async fn run_check<F, E>(timeout: Duration, f: F, component: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => {
            tracing::warn!(component = component, error = %e, "Health check error");
            "unhealthy".to_string()
        }
        Err(_) => {
            tracing::warn!(component = component, "Health check timed out");
            "timeout".to_string()
        }
    }
}

#[derive(serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Record store and blob store reachability.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = run_check(TIMEOUT, state.materials.records_health(), "database").await;
    let storage = run_check(TIMEOUT, state.materials.storage_health(), "storage").await;

    let healthy = database == "healthy" && storage == "healthy";
    if !healthy {
        tracing::warn!(database = %database, storage = %storage, "Health check failed");
    }

    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        database,
        storage,
    };
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_check_reports_each_outcome() {
        let ok = run_check(TIMEOUT, async { Ok::<(), String>(()) }, "database").await;
        assert_eq!(ok, "healthy");

        let failed = run_check(
            TIMEOUT,
            async { Err::<(), _>("Failed to create storage directory /srv/uploads: denied") },
            "storage",
        )
        .await;
        assert_eq!(failed, "unhealthy");
        assert!(!failed.contains("/srv/uploads"));

        let slow = run_check(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), String>(())
            },
            "database",
        )
        .await;
        assert_eq!(slow, "timeout");
    }
}
