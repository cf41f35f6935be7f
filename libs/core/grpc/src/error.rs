use std::time::Duration;
use thiserror::Error;

pub type GrpcResult<T> = Result<T, GrpcError>;

/// Errors raised while building or connecting a channel
#[derive(Error, Debug)]
pub enum GrpcError {
  #[error("Invalid URI: {0}")]
  InvalidUri(#[from] tonic::transport::Error),

  #[error("Connection failed: {0}")]
  ConnectionFailed(tonic::transport::Error),

  #[error("Connection timeout after {0:?}")]
  ConnectionTimeout(Duration),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),
}

impl GrpcError {
  /// True when retrying the same address could succeed
  pub fn is_transient(&self) -> bool {
    matches!(self, GrpcError::ConnectionFailed(_) | GrpcError::ConnectionTimeout(_))
  }
}

impl From<GrpcError> for tonic::Status {
  fn from(err: GrpcError) -> Self {
    if err.is_transient() {
      tonic::Status::unavailable(err.to_string())
    } else {
      tonic::Status::invalid_argument(err.to_string())
    }
  }
}
