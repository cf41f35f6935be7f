use core_config::{ConfigError, FromEnv, env_duration_secs, env_parse, server::ServerConfig};
use database::postgres::PostgresConfig;
use database::redis::RedisConfig;
use domain_prediction::{EmbeddingConfig, PipelineConfig, QdrantConfig};
use std::time::Duration;

pub use core_config::Environment;

/// Everything the service reads from the environment at startup
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: PostgresConfig,
    /// `None` keeps both cache tiers in process memory
    pub redis: Option<RedisConfig>,
    pub qdrant: QdrantConfig,
    pub embedding: EmbeddingConfig,
    pub pipeline: PipelineConfig,
    /// Reject uploads whose `md5` field does not match the image bytes
    pub verify_md5: bool,
    /// Time allowed for queued cache writes to drain on shutdown
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            database: PostgresConfig::from_env()?, // DATABASE_URL is required
            redis: RedisConfig::from_env_optional()?,
            qdrant: QdrantConfig::from_env()?,
            embedding: EmbeddingConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
            verify_md5: env_parse("PREDICTION_VERIFY_MD5", true)?,
            shutdown_grace: env_duration_secs("SHUTDOWN_GRACE_SECS", 10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_environment() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://u:p@localhost:5432/catalog")),
                ("REDIS_URL", None),
                ("REDIS_HOST", None),
                ("PREDICTION_VERIFY_MD5", None),
                ("SHUTDOWN_GRACE_SECS", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.redis.is_none());
                assert!(config.verify_md5);
                assert_eq!(config.shutdown_grace, Duration::from_secs(10));
                assert_eq!(config.pipeline.request_timeout, Duration::from_secs(60));
            },
        );
    }

    #[test]
    fn test_database_url_is_required() {
        temp_env::with_var_unset("DATABASE_URL", || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
        });
    }

    #[test]
    fn test_redis_and_md5_switch() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://u:p@localhost:5432/catalog")),
                ("REDIS_URL", Some("redis://cache:6379")),
                ("PREDICTION_VERIFY_MD5", Some("false")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.redis.is_some());
                assert!(!config.verify_md5);
            },
        );
    }

    #[test]
    fn test_zero_grace_is_rejected() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://u:p@localhost:5432/catalog")),
                ("SHUTDOWN_GRACE_SECS", Some("0")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(err.to_string().contains("SHUTDOWN_GRACE_SECS"));
            },
        );
    }
}
