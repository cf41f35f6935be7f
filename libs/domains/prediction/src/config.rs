use core_config::{env_duration_secs, env_or_default, env_parse, ConfigError, FromEnv};
use std::time::Duration;

use crate::models::{DEFAULT_TOP_K, MIN_CACHED_IDS};

/// Timeouts and sizing for [`crate::PredictionPipeline`]
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub embed_timeout: Duration,
    pub search_timeout: Duration,
    /// Per-id entity store lookup
    pub store_timeout: Duration,
    /// Every cache read and write
    pub cache_timeout: Duration,
    /// Overall budget for one `resolve` call
    pub request_timeout: Duration,
    pub top_k: u64,
    pub min_cached_ids: usize,
    pub entity_ttl: Duration,
    pub writer: WriterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embed_timeout: Duration::from_secs(30),
            search_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(15),
            cache_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
            top_k: DEFAULT_TOP_K,
            min_cached_ids: MIN_CACHED_IDS,
            entity_ttl: Duration::from_secs(24 * 60 * 60),
            writer: WriterConfig::default(),
        }
    }
}

impl FromEnv for PipelineConfig {
    /// Reads `PREDICTION_*_TIMEOUT_SECS` plus the writer pool sizing
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            embed_timeout: env_duration_secs("PREDICTION_EMBED_TIMEOUT_SECS", 30)?,
            search_timeout: env_duration_secs("PREDICTION_SEARCH_TIMEOUT_SECS", 10)?,
            store_timeout: env_duration_secs("PREDICTION_STORE_TIMEOUT_SECS", 15)?,
            cache_timeout: env_duration_secs("PREDICTION_CACHE_TIMEOUT_SECS", 5)?,
            request_timeout: env_duration_secs("PREDICTION_REQUEST_TIMEOUT_SECS", 60)?,
            writer: WriterConfig::from_env()?,
            ..defaults
        })
    }
}

/// Background cache writer pool
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    /// Deadline for one background write, independent of any request
    pub job_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            workers: 8,
            job_timeout: Duration::from_secs(10),
        }
    }
}

impl FromEnv for WriterConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let queue_capacity: usize = env_parse("PREDICTION_WRITER_QUEUE", 1024)?;
        let workers: usize = env_parse("PREDICTION_WRITER_WORKERS", 8)?;

        for (key, value) in [
            ("PREDICTION_WRITER_QUEUE", queue_capacity),
            ("PREDICTION_WRITER_WORKERS", workers),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    details: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(Self {
            queue_capacity,
            workers,
            ..Self::default()
        })
    }
}

/// Qdrant connection and collection layout
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub collection: String,
    /// Named vector field holding image embeddings
    pub vector_name: String,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_vector_name(mut self, name: impl Into<String>) -> Self {
        self.vector_name = name.into();
        self
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            timeout_secs: 30,
            collection: "catalog_items".to_string(),
            vector_name: "vector".to_string(),
        }
    }
}

impl FromEnv for QdrantConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("QDRANT_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            url: env_or_default("QDRANT_URL", "http://localhost:6334"),
            api_key,
            timeout_secs: env_parse("QDRANT_TIMEOUT_SECS", 30)?,
            collection: env_or_default("QDRANT_COLLECTION", "catalog_items"),
            vector_name: env_or_default("QDRANT_VECTOR_NAME", "vector"),
        })
    }
}

/// Remote embedding service
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub url: String,
    /// Model name sent with every request
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:1301".to_string(),
            model: "image2vec".to_string(),
        }
    }
}

impl FromEnv for EmbeddingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("EMBEDDING_GRPC_URL", "http://127.0.0.1:1301"),
            model: env_or_default("EMBEDDING_MODEL", "image2vec"),
        })
    }
}
