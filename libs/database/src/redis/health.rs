use std::time::{Duration, Instant};

use redis::aio::ConnectionLike;
use tracing::debug;

use crate::common::DatabaseError;

/// PING the server, failing if it does not answer within `timeout`.
pub async fn check_health<C>(conn: &mut C, timeout: Duration) -> Result<(), DatabaseError>
where
    C: ConnectionLike + Send,
{
    let reply = tokio::time::timeout(timeout, redis::cmd("PING").query_async::<String>(conn))
        .await
        .map_err(|_| DatabaseError::HealthCheckTimeout(timeout.as_millis() as u64))?
        .map_err(|e| DatabaseError::HealthCheckFailed(format!("Redis PING failed: {e}")))?;

    if reply != "PONG" {
        return Err(DatabaseError::HealthCheckFailed(format!(
            "Redis PING returned unexpected reply: {reply}"
        )));
    }

    debug!("Redis health check passed");
    Ok(())
}

/// Probe outcome with latency, for readiness payloads
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthStatus {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            healthy: true,
            message: None,
            response_time_ms,
        }
    }

    pub fn unhealthy(message: String, response_time_ms: u64) -> Self {
        Self {
            healthy: false,
            message: Some(message),
            response_time_ms,
        }
    }
}

pub async fn check_health_detailed<C>(conn: &mut C, timeout: Duration) -> HealthStatus
where
    C: ConnectionLike + Send,
{
    let start = Instant::now();
    let result = check_health(conn, timeout).await;
    let elapsed = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => HealthStatus::healthy(elapsed),
        Err(e) => HealthStatus::unhealthy(e.to_string(), elapsed),
    }
}
