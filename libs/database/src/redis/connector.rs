use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use super::RedisConfig;
use crate::common::{RetryConfig, retry_with_backoff};

/// Open a `ConnectionManager` and verify it with a PING.
///
/// The manager reconnects on its own after the initial handshake, so callers
/// clone it freely instead of pooling.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut probe = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut probe).await?;

    info!(url = %redact(url), "connected to Redis");
    Ok(manager)
}

pub async fn connect_from_config(config: &RedisConfig) -> redis::RedisResult<ConnectionManager> {
    connect(&config.connection_url()).await
}

/// Connect with exponential backoff. `None` uses [`RetryConfig::default`].
pub async fn connect_with_retry(
    config: &RedisConfig,
    retry_config: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    let url = config.connection_url();
    retry_with_backoff(|| connect(&url), retry_config.unwrap_or_default()).await
}

/// Strip userinfo from a connection URL before it reaches the logs
pub(crate) fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
