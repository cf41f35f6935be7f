//! Server infrastructure module.
//!
//! - Router assembly with the OpenAPI document and shared middleware
//! - Liveness and readiness endpoints
//! - Graceful shutdown with a bounded cleanup step

pub mod app;
pub mod health;
pub mod shutdown;

pub use app::{create_production_app, create_router};
pub use health::{HealthCheckFuture, HealthResponse, health_router, run_health_checks};
pub use shutdown::shutdown_signal;
