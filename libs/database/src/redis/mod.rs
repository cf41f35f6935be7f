//! Redis connection setup and probes.

mod config;
mod connector;
mod health;

pub use config::RedisConfig;
pub use connector::{connect, connect_from_config, connect_with_retry};
pub use health::{HealthStatus, check_health, check_health_detailed};

pub use redis::aio::ConnectionManager;
pub use redis::{AsyncCommands, RedisResult};
