use std::time::{Duration, Instant};

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::debug;

use crate::common::DatabaseError;

/// Run `SELECT 1`, failing if it does not complete within `timeout`.
pub async fn check_health(db: &DatabaseConnection, timeout: Duration) -> Result<(), DatabaseError> {
    let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());

    tokio::time::timeout(timeout, db.query_one_raw(stmt))
        .await
        .map_err(|_| DatabaseError::HealthCheckTimeout(timeout.as_millis() as u64))?
        .map_err(|e| DatabaseError::HealthCheckFailed(format!("PostgreSQL probe failed: {e}")))?;

    debug!("PostgreSQL health check passed");
    Ok(())
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

pub async fn check_health_detailed(db: &DatabaseConnection, timeout: Duration) -> HealthStatus {
    let start = Instant::now();
    let result = check_health(db, timeout).await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    HealthStatus {
        healthy: result.is_ok(),
        message: result.err().map(|e| e.to_string()),
        response_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_check_health_fails_on_query_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([sea_orm::DbErr::Custom("connection reset".to_string())])
            .into_connection();

        let status = check_health_detailed(&db, Duration::from_secs(1)).await;

        assert!(!status.healthy);
        assert!(status.message.unwrap().contains("connection reset"));
    }
}
