//! Image Prediction Domain Library
//!
//! Answers "which catalog items look like this image?" by embedding the
//! image remotely, searching a vector index, and resolving the ranked ids to
//! item metadata.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ PredictionPipeline │  ← caches, single-flight, deadlines, background writes
//! └─────────┬──────────┘
//!           │
//!   ┌───────┼──────────────┬──────────────────┬──────────────────┐
//!   │       │              │                  │                  │
//! ┌─▼───────────────┐ ┌────▼─────────────┐ ┌──▼──────────┐ ┌─────▼──────────────┐
//! │ EmbeddingClient │ │ VectorIndexClient│ │ EntityStore │ │ ResponseCache /    │
//! │ (gRPC)          │ │ (Qdrant)         │ │ (Postgres)  │ │ EntityCache (Redis)│
//! └─────────────────┘ └──────────────────┘ └─────────────┘ └────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_prediction::{
//!     ImageFingerprint, InMemoryCache, InMemoryEntityStore, PipelineConfig, PipelineDeps,
//!     PredictionPipeline,
//! };
//! # use domain_prediction::{EmbeddingClient, VectorIndexClient};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     embedding: Arc<dyn EmbeddingClient>,
//! #     index: Arc<dyn VectorIndexClient>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let cache = InMemoryCache::new();
//! let pipeline = PredictionPipeline::new(
//!     PipelineDeps {
//!         embedding,
//!         index,
//!         store: Arc::new(InMemoryEntityStore::new()),
//!         response_cache: Arc::new(cache.clone()),
//!         entity_cache: Arc::new(cache),
//!     },
//!     PipelineConfig::default(),
//! );
//!
//! let fingerprint = ImageFingerprint::parse_md5("d41d8cd98f00b204e9800998ecf8427e")?;
//! let response = pipeline.predict(&fingerprint, bytes::Bytes::from_static(b"...")).await;
//! println!("{} items", response.contents.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod singleflight;
pub mod store;
pub mod writer;

pub use cache::{EntityCache, InMemoryCache, RedisEntityCache, RedisResponseCache, ResponseCache};
pub use config::{EmbeddingConfig, PipelineConfig, QdrantConfig, WriterConfig};
pub use embedding::{EmbeddingClient, GrpcEmbeddingClient};
pub use error::{
    CacheError, EmbeddingError, FingerprintError, PredictionError, SearchError, StoreError,
    UploadError,
};
pub use handlers::{PredictionApiDoc, PredictionState, router};
pub use index::{QdrantIndexClient, SearchParams, VectorIndexClient};
pub use models::{
    EmbeddingVector, ImageFingerprint, Item, ItemId, ItemMetadata, PredictResponse, RankedIdList,
    SearchHit,
};
pub use pipeline::{PipelineDeps, PredictionPipeline};
pub use singleflight::{FlightCancelled, SingleFlight};
pub use store::{EntityStore, InMemoryEntityStore, PgEntityStore};
pub use writer::CacheWriter;
