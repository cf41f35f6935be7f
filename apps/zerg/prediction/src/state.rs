//! Backend handles used by the readiness probe

use database::postgres::DatabaseConnection;
use database::redis::ConnectionManager;
use domain_prediction::{GrpcEmbeddingClient, QdrantIndexClient};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// Absent when caching runs in process memory
    pub redis: Option<ConnectionManager>,
    pub index: QdrantIndexClient,
    pub embedding: GrpcEmbeddingClient,
}
