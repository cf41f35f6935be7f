use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use axum_helpers::server::{HealthCheckFuture, run_health_checks};
use serde_json::Value;
use std::time::Duration;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// `/ready`: PostgreSQL, Redis (when configured), Qdrant and the embedding service
pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(ready_handler))
        .with_state(state)
}

async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
        (
            "database",
            Box::pin(async {
                database::postgres::check_health(&state.db, CHECK_TIMEOUT)
                    .await
                    .map_err(|e| e.to_string())
            }),
        ),
        (
            "qdrant",
            Box::pin(async {
                state.index.health_check().await.map_err(|e| e.to_string())
            }),
        ),
        (
            "embedding",
            Box::pin(async {
                state
                    .embedding
                    .check_health(CHECK_TIMEOUT)
                    .await
                    .map_err(|e| e.to_string())
            }),
        ),
    ];

    if let Some(redis) = &state.redis {
        let mut conn = redis.clone();
        checks.push((
            "redis",
            Box::pin(async move {
                database::redis::check_health(&mut conn, CHECK_TIMEOUT)
                    .await
                    .map_err(|e| e.to_string())
            }),
        ));
    }

    run_health_checks(checks, CHECK_TIMEOUT).await
}
