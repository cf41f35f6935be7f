//! Redis test infrastructure
//!
//! Provides a `TestRedis` helper that creates a Redis container for testing.

use redis::aio::MultiplexedConnection;
use redis::Client;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// Redis container for cache tests; removed when dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestRedis;
/// use redis::AsyncCommands;
///
/// # async fn example() {
/// let redis = TestRedis::new().await;
/// let mut conn = redis.connection();
///
/// conn.set::<_, _, ()>("prediction:abc", "1,2,3").await.unwrap();
/// let value: String = conn.get("prediction:abc").await.unwrap();
/// assert_eq!(value, "1,2,3");
/// # }
/// ```
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    connection: MultiplexedConnection,
    pub connection_string: String,
}

impl TestRedis {
    /// Start `redis:8-alpine` and open one multiplexed connection to it
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");
        let connection_string = format!("redis://127.0.0.1:{port}");

        let connection = Client::open(connection_string.as_str())
            .expect("Failed to create Redis client")
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to connect to Redis");

        tracing::info!(port, "test Redis ready");

        Self {
            _container: container,
            connection,
            connection_string,
        }
    }

    /// Cloned multiplexed connection, usable directly as a cache backend
    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::AsyncCommands;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_redis_set_get() {
        let redis = TestRedis::new().await;
        let mut conn = redis.connection();

        conn.set::<_, _, ()>("prediction:abc", "1,2,3").await.unwrap();

        let value: String = conn.get("prediction:abc").await.unwrap();
        assert_eq!(value, "1,2,3");
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_redis_set_nx_keeps_first_value() {
        let redis = TestRedis::new().await;
        let mut conn = redis.connection();

        let first: bool = conn.set_nx("entity:1", "first").await.unwrap();
        let second: bool = conn.set_nx("entity:1", "second").await.unwrap();

        assert!(first);
        assert!(!second);
        let value: String = conn.get("entity:1").await.unwrap();
        assert_eq!(value, "first");
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_redis_expiry() {
        let redis = TestRedis::new().await;
        let mut conn = redis.connection();

        conn.set_ex::<_, _, ()>("entity:2", "value", 1).await.unwrap();
        let exists: bool = conn.exists("entity:2").await.unwrap();
        assert!(exists);

        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        let exists: bool = conn.exists("entity:2").await.unwrap();
        assert!(!exists);
    }
}
