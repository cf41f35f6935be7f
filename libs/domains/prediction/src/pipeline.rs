//! Request-scoped orchestration: response cache, embed, search, resolve, repopulate

use bytes::Bytes;
use observability::PredictionMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{EntityCache, ResponseCache};
use crate::config::PipelineConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{CacheError, EmbeddingError, PredictionError, SearchError};
use crate::index::{SearchParams, VectorIndexClient};
use crate::models::{ImageFingerprint, Item, ItemId, ItemMetadata, PredictResponse, RankedIdList};
use crate::singleflight::SingleFlight;
use crate::store::EntityStore;
use crate::writer::CacheWriter;

/// Everything the pipeline talks to
#[derive(Clone)]
pub struct PipelineDeps {
    pub embedding: Arc<dyn EmbeddingClient>,
    pub index: Arc<dyn VectorIndexClient>,
    pub store: Arc<dyn EntityStore>,
    pub response_cache: Arc<dyn ResponseCache>,
    pub entity_cache: Arc<dyn EntityCache>,
}

type ComputedIds = Result<RankedIdList, PredictionError>;

/// Resolves an image to ranked catalog items.
///
/// A cached id list with enough entries skips the embedding and search
/// calls. Only those two calls can fail a request; every other problem
/// degrades to a cache miss or an item with empty fields.
pub struct PredictionPipeline {
    deps: PipelineDeps,
    config: PipelineConfig,
    flights: SingleFlight<ImageFingerprint, ComputedIds>,
    writer: CacheWriter,
}

impl PredictionPipeline {
    /// Must be called inside a Tokio runtime; starts the background writer.
    pub fn new(deps: PipelineDeps, config: PipelineConfig) -> Self {
        let writer = CacheWriter::spawn(&config.writer);
        Self {
            deps,
            config,
            flights: SingleFlight::new(),
            writer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn writer(&self) -> &CacheWriter {
        &self.writer
    }

    /// Resolve and map the outcome to the caller envelope
    pub async fn predict(&self, fingerprint: &ImageFingerprint, image: Bytes) -> PredictResponse {
        let started = Instant::now();

        match self.resolve(fingerprint, image).await {
            Ok(items) => {
                PredictionMetrics::record_request("success", started.elapsed());
                PredictResponse::success(items)
            }
            Err(err) => {
                PredictionMetrics::record_failure(err.kind());
                PredictionMetrics::record_request(err.kind(), started.elapsed());
                match &err {
                    PredictionError::NoMatchFound => {
                        info!(fingerprint = %fingerprint, "no similar items")
                    }
                    _ => warn!(fingerprint = %fingerprint, error = %err, "prediction failed"),
                }
                err.into()
            }
        }
    }

    #[instrument(skip(self, image), fields(fingerprint = %fingerprint, image_bytes = image.len()))]
    pub async fn resolve(
        &self,
        fingerprint: &ImageFingerprint,
        image: Bytes,
    ) -> Result<Vec<Item>, PredictionError> {
        let deadline = Instant::now() + self.config.request_timeout;

        let (ids, from_cache) = match self.cached_ids(fingerprint, deadline).await {
            Some(ids) => (ids, true),
            None => (self.compute_ids(fingerprint, image, deadline).await?, false),
        };

        let started = Instant::now();
        let (items, fetched) = self.resolve_items(&ids, deadline).await;
        PredictionMetrics::record_stage_duration("resolve", started.elapsed());

        if !from_cache {
            self.queue_response_write(fingerprint, &ids);
        }
        self.queue_entity_writes(fetched);

        Ok(items)
    }

    async fn cached_ids(&self, fingerprint: &ImageFingerprint, deadline: Instant) -> Option<RankedIdList> {
        let budget = remaining(self.config.cache_timeout, deadline);
        let lookup = timeout(budget, self.deps.response_cache.get(fingerprint))
            .await
            .unwrap_or(Err(CacheError::Timeout(budget)));

        match lookup {
            Ok(Some(ids)) if ids.is_authoritative(self.config.min_cached_ids) => {
                debug!(ids = ids.len(), "response cache hit");
                PredictionMetrics::record_cache_hit();
                Some(ids)
            }
            Ok(Some(ids)) => {
                debug!(ids = ids.len(), "cached id list too short, recomputing");
                PredictionMetrics::record_cache_miss("short");
                None
            }
            Ok(None) => {
                PredictionMetrics::record_cache_miss("absent");
                None
            }
            Err(CacheError::Codec(reason)) => {
                warn!(%reason, "malformed cached id list, recomputing");
                PredictionMetrics::record_cache_miss("malformed");
                None
            }
            Err(err) => {
                warn!(error = %err, "response cache unavailable, recomputing");
                PredictionMetrics::record_cache_miss("error");
                None
            }
        }
    }

    /// Embed then search, once per fingerprint across concurrent callers
    async fn compute_ids(
        &self,
        fingerprint: &ImageFingerprint,
        image: Bytes,
        deadline: Instant,
    ) -> ComputedIds {
        let stages = RemoteStages {
            embedding: self.deps.embedding.clone(),
            index: self.deps.index.clone(),
            embed_timeout: self.config.embed_timeout,
            search_timeout: self.config.search_timeout,
            params: SearchParams::with_top_k(self.config.top_k),
        };

        self.flights
            .run(fingerprint.clone(), move || stages.run(image, deadline))
            .await
            .unwrap_or_else(|cancelled| {
                Err(PredictionError::Embedding(EmbeddingError::Unavailable(
                    cancelled.to_string(),
                )))
            })
    }

    /// Strictly in rank order. Returns the items and the metadata fetched
    /// from the store, which is what the entity cache lacks.
    async fn resolve_items(&self, ids: &RankedIdList, deadline: Instant) -> (Vec<Item>, Vec<ItemMetadata>) {
        let mut items = Vec::with_capacity(ids.len());
        let mut fetched = Vec::new();

        for (rank, &id) in ids.ids().iter().enumerate() {
            if let Some(meta) = self.cached_entity(id, deadline).await {
                PredictionMetrics::record_entity_source("cache");
                items.push(meta.ranked(rank));
                continue;
            }

            match self.stored_entity(id, deadline).await {
                Some(meta) => {
                    PredictionMetrics::record_entity_source("store");
                    items.push(meta.clone().ranked(rank));
                    fetched.push(meta);
                }
                None => {
                    PredictionMetrics::record_entity_source("none");
                    items.push(ItemMetadata::placeholder(id).ranked(rank));
                }
            }
        }

        (items, fetched)
    }

    async fn cached_entity(&self, id: ItemId, deadline: Instant) -> Option<ItemMetadata> {
        let budget = remaining(self.config.cache_timeout, deadline);
        match timeout(budget, self.deps.entity_cache.get(id)).await {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                debug!(item_id = id, error = %err, "entity cache read failed");
                None
            }
            Err(_) => {
                debug!(item_id = id, "entity cache read timed out");
                None
            }
        }
    }

    async fn stored_entity(&self, id: ItemId, deadline: Instant) -> Option<ItemMetadata> {
        let budget = remaining(self.config.store_timeout, deadline);
        match timeout(budget, self.deps.store.find_by_id(id)).await {
            Ok(Ok(Some(meta))) => Some(meta),
            Ok(Ok(None)) => {
                warn!(item_id = id, "item missing from store, returning empty fields");
                PredictionMetrics::record_entity_degraded("missing");
                None
            }
            Ok(Err(err)) => {
                warn!(item_id = id, error = %err, "store lookup failed, returning empty fields");
                PredictionMetrics::record_entity_degraded("error");
                None
            }
            Err(_) => {
                warn!(item_id = id, timeout_ms = budget.as_millis() as u64, "store lookup timed out");
                PredictionMetrics::record_entity_degraded("timeout");
                None
            }
        }
    }

    fn queue_response_write(&self, fingerprint: &ImageFingerprint, ids: &RankedIdList) {
        let cache = self.deps.response_cache.clone();
        let fingerprint = fingerprint.clone();
        let ids = ids.clone();
        let budget = self.config.cache_timeout;

        self.writer.submit("response", async move {
            timeout(budget, cache.set(&fingerprint, &ids))
                .await
                .unwrap_or(Err(CacheError::Timeout(budget)))
        });
    }

    fn queue_entity_writes(&self, fetched: Vec<ItemMetadata>) {
        let ttl = self.config.entity_ttl;
        let budget = self.config.cache_timeout;

        for meta in fetched {
            let cache = self.deps.entity_cache.clone();
            self.writer.submit("entity", async move {
                let written = timeout(budget, cache.set_if_absent(&meta, ttl))
                    .await
                    .unwrap_or(Err(CacheError::Timeout(budget)))?;
                if !written {
                    debug!(item_id = meta.item_id, "entity already cached");
                }
                Ok(())
            });
        }
    }
}

/// The two remote calls, detached from `&self` so they can run under
/// single-flight
struct RemoteStages {
    embedding: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndexClient>,
    embed_timeout: Duration,
    search_timeout: Duration,
    params: SearchParams,
}

impl RemoteStages {
    async fn run(self, image: Bytes, deadline: Instant) -> ComputedIds {
        let request_id = Uuid::new_v4();

        let budget = remaining(self.embed_timeout, deadline);
        let started = Instant::now();
        let vector = timeout(budget, self.embedding.embed(image, request_id, budget))
            .await
            .unwrap_or(Err(EmbeddingError::Timeout(budget)))
            .inspect_err(|e| warn!(%request_id, error = %e, "embedding failed"))?;
        PredictionMetrics::record_stage_duration("embed", started.elapsed());

        let budget = remaining(self.search_timeout, deadline);
        let started = Instant::now();
        let hits = timeout(budget, self.index.search(vector, self.params))
            .await
            .unwrap_or(Err(SearchError::Timeout(budget)))
            .inspect_err(|e| warn!(%request_id, error = %e, "vector search failed"))?;
        PredictionMetrics::record_stage_duration("search", started.elapsed());

        if hits.is_empty() {
            return Err(PredictionError::NoMatchFound);
        }

        debug!(%request_id, hits = hits.len(), "search returned candidates");
        Ok(RankedIdList::new(hits.into_iter().map(|h| h.item_id).collect()))
    }
}

/// Smaller of the stage limit and what is left of the request budget
fn remaining(stage: Duration, deadline: Instant) -> Duration {
    stage.min(deadline.saturating_duration_since(Instant::now()))
}
