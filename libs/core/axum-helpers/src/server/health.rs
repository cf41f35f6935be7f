use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

/// A boxed future for health checks with a string error
pub type HealthCheckFuture<'a> = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>;

/// Runs the checks concurrently, each bounded by `timeout`.
///
/// The body maps every check name to `"connected"` or `"disconnected"`
/// next to an overall `status`. Any failure turns the answer into a 503.
///
/// # Example
/// ```ignore
/// let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
///     ("database", Box::pin(async { db.ping().await.map_err(|e| e.to_string()) })),
///     ("qdrant", Box::pin(async { index.health_check().await.map_err(|e| e.to_string()) })),
/// ];
/// run_health_checks(checks, Duration::from_secs(2)).await
/// ```
pub async fn run_health_checks(
    checks: Vec<(&str, HealthCheckFuture<'_>)>,
    timeout: Duration,
) -> (StatusCode, Json<Value>) {
    let names: Vec<_> = checks.iter().map(|(name, _)| *name).collect();
    let results = join_all(checks.into_iter().map(|(_, check)| async move {
        match tokio::time::timeout(timeout, check).await {
            Ok(result) => result,
            Err(_) => Err(format!("timed out after {:?}", timeout)),
        }
    }))
    .await;

    let mut services = Map::new();
    let mut all_healthy = true;

    for (name, result) in names.into_iter().zip(results) {
        let state = match result {
            Ok(()) => "connected",
            Err(e) => {
                tracing::error!("Readiness check failed: {} error: {}", name, e);
                all_healthy = false;
                "disconnected"
            }
        };
        services.insert(name.to_string(), json!(state));
    }

    let status = if all_healthy { "ready" } else { "not ready" };
    services.insert("status".to_string(), json!(status));

    let code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(Value::Object(services)))
}

async fn health_handler(State(health): State<HealthResponse>) -> Json<HealthResponse> {
    Json(health)
}

/// Liveness endpoint at `/health`; always 200 while the process serves requests.
pub fn health_router(name: &'static str, version: &'static str) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(HealthResponse {
            status: "healthy",
            name,
            version,
        })
}
