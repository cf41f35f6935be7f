//! Nearest-neighbor lookup against the remote vector index

mod qdrant;

pub use qdrant::QdrantIndexClient;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::models::{DEFAULT_TOP_K, EmbeddingVector, SearchHit};

/// Fixed query parameters. Similarity is always cosine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub top_k: u64,
    /// How much of the graph is explored per query
    pub breadth: u64,
    /// Read from all replicas
    pub strong_consistency: bool,
    /// Exclude not-yet-indexed segments
    pub ignore_growing: bool,
}

impl SearchParams {
    pub fn with_top_k(top_k: u64) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            breadth: 512,
            strong_consistency: true,
            ignore_growing: false,
        }
    }
}

/// Ranked neighbors of a vector, best first
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndexClient: Send + Sync {
    async fn search(
        &self,
        vector: EmbeddingVector,
        params: SearchParams,
    ) -> Result<Vec<SearchHit>, SearchError>;
}
