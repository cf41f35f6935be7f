pub mod config;

pub use config::ChannelConfig;

use crate::error::{GrpcError, GrpcResult};
use tonic::transport::{Channel, Endpoint};

fn endpoint_for(addr: &str, config: ChannelConfig) -> GrpcResult<Endpoint> {
  config.validate()?;

  let endpoint = Endpoint::from_shared(addr.to_string()).map_err(|e| {
    tracing::error!(target: "grpc_client", addr = %addr, error = ?e, "Invalid URI");
    GrpcError::InvalidUri(e)
  })?;

  Ok(config.apply_to_endpoint(endpoint))
}

/// Connect eagerly with default settings
pub async fn create_channel(addr: impl Into<String>) -> GrpcResult<Channel> {
  create_channel_with_config(addr, ChannelConfig::default()).await
}

/// Connect eagerly, failing fast if the peer is not reachable
pub async fn create_channel_with_config(
  addr: impl Into<String>,
  config: ChannelConfig,
) -> GrpcResult<Channel> {
  let addr = addr.into();
  let connect_timeout = config.connect_timeout;
  let endpoint = endpoint_for(&addr, config)?;

  tracing::debug!(target: "grpc_client", addr = %addr, "Creating gRPC channel");

  match tokio::time::timeout(connect_timeout, endpoint.connect()).await {
    Ok(Ok(channel)) => Ok(channel),
    Ok(Err(e)) => {
      tracing::error!(target: "grpc_client", addr = %addr, error = ?e, "Failed to connect to gRPC service");
      Err(GrpcError::ConnectionFailed(e))
    }
    Err(_) => Err(GrpcError::ConnectionTimeout(connect_timeout)),
  }
}

/// Build a channel that connects on first use and reconnects on its own.
///
/// Returns without touching the network, so the peer may still be down.
pub fn create_channel_lazy(addr: impl Into<String>) -> GrpcResult<Channel> {
  create_channel_lazy_with_config(addr, ChannelConfig::default())
}

pub fn create_channel_lazy_with_config(
  addr: impl Into<String>,
  config: ChannelConfig,
) -> GrpcResult<Channel> {
  let addr = addr.into();
  let endpoint = endpoint_for(&addr, config)?;

  tracing::debug!(
    target: "grpc_client",
    addr = %addr,
    "Creating lazy gRPC channel (connects on first request)"
  );

  Ok(endpoint.connect_lazy())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_invalid_uri() {
    let result = create_channel("not a valid uri").await;
    assert!(matches!(result.unwrap_err(), GrpcError::InvalidUri(_)));
  }

  #[tokio::test]
  async fn test_lazy_channel_does_not_connect() {
    // Nothing listens on this port; a lazy channel must still build
    let result = create_channel_lazy("http://127.0.0.1:9");
    assert!(result.is_ok());
  }

  #[tokio::test]
  async fn test_lazy_channel_rejects_invalid_config() {
    let config = ChannelConfig::new().with_connect_timeout(Duration::ZERO);
    let result = create_channel_lazy_with_config("http://127.0.0.1:1301", config);
    assert!(matches!(result.unwrap_err(), GrpcError::InvalidConfig(_)));
  }

  #[tokio::test]
  async fn test_eager_channel_reports_unreachable_peer() {
    let config = ChannelConfig::new().with_connect_timeout(Duration::from_millis(500));
    let result = create_channel_with_config("http://127.0.0.1:9", config).await;
    assert!(result.is_err());
  }
}
