//! Image to vector conversion through the remote embedding service

mod grpc;

pub use grpc::GrpcEmbeddingClient;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

use crate::error::EmbeddingError;
use crate::models::EmbeddingVector;

/// Turns raw image bytes into a feature vector.
///
/// One call is one request/response exchange. `deadline` bounds the call and
/// elapsing it yields [`EmbeddingError::Timeout`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(
        &self,
        image: Bytes,
        request_id: Uuid,
        deadline: Duration,
    ) -> Result<EmbeddingVector, EmbeddingError>;
}
