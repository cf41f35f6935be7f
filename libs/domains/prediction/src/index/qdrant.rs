use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    self, Distance, PayloadIncludeSelector, ReadConsistency, ReadConsistencyType,
    SearchParamsBuilder, SearchPointsBuilder, Value as QdrantValue, WithPayloadSelector,
    point_id::PointIdOptions, read_consistency, vectors_config, with_payload_selector,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{SearchParams, VectorIndexClient};
use crate::config::QdrantConfig;
use crate::error::SearchError;
use crate::models::{EmbeddingVector, ItemId, SearchHit};

const ITEM_ID_FIELD: &str = "item_id";
const META_FIELD: &str = "meta";

/// Searches one Qdrant collection by its named image vector
#[derive(Clone)]
pub struct QdrantIndexClient {
    client: Arc<Qdrant>,
    collection: String,
    vector_name: String,
}

impl QdrantIndexClient {
    pub fn new(config: &QdrantConfig) -> Result<Self, SearchError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::Backend(format!("failed to build qdrant client: {e}")))?;

        Ok(Self::from_client(
            client,
            config.collection.clone(),
            config.vector_name.clone(),
        ))
    }

    pub fn from_client(client: Qdrant, collection: String, vector_name: String) -> Self {
        Self {
            client: Arc::new(client),
            collection,
            vector_name,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Refuse to serve from a collection whose image vector is not cosine
    pub async fn verify_collection(&self) -> Result<(), SearchError> {
        let invalid = |reason: String| SearchError::InvalidCollection {
            collection: self.collection.clone(),
            reason,
        };

        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| invalid(e.to_string()))?;

        let config = info
            .result
            .and_then(|r| r.config)
            .ok_or_else(|| invalid("collection info has no config".to_string()))?;

        match vector_distance(&config, &self.vector_name) {
            Some(Distance::Cosine) => {
                info!(collection = %self.collection, vector = %self.vector_name, "vector index ready");
                Ok(())
            }
            Some(other) => Err(invalid(format!(
                "vector {} uses {} distance, cosine required",
                self.vector_name,
                other.as_str_name()
            ))),
            None => Err(invalid(format!("vector {} not found", self.vector_name))),
        }
    }

    pub async fn health_check(&self) -> Result<(), SearchError> {
        self.client.health_check().await?;
        Ok(())
    }

    fn build_search(&self, vector: EmbeddingVector, params: SearchParams) -> SearchPointsBuilder {
        let consistency = if params.strong_consistency {
            ReadConsistencyType::All
        } else {
            ReadConsistencyType::Majority
        };

        let mut builder =
            SearchPointsBuilder::new(&self.collection, vector.into_inner(), params.top_k)
                .vector_name(self.vector_name.clone())
                .params(
                    SearchParamsBuilder::default()
                        .hnsw_ef(params.breadth)
                        .exact(false)
                        .indexed_only(params.ignore_growing),
                );
        if let Some(selector) = payload_selector().selector_options {
            builder = builder.with_payload(selector);
        }
        let read_consistency = ReadConsistency {
            value: Some(read_consistency::Value::Type(consistency as i32)),
        };
        if let Some(value) = read_consistency.value {
            builder = builder.read_consistency(value);
        }
        builder
    }
}

#[async_trait]
impl VectorIndexClient for QdrantIndexClient {
    #[instrument(skip(self, vector), fields(collection = %self.collection, top_k = params.top_k))]
    async fn search(
        &self,
        vector: EmbeddingVector,
        params: SearchParams,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .search_points(self.build_search(vector, params))
            .await?;

        let hits: Vec<SearchHit> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let item_id = item_id_of(&point.payload, point.id.as_ref());
                if item_id.is_none() {
                    warn!(point = ?point.id, "search hit has no usable item id, skipping");
                }
                Some(SearchHit {
                    item_id: item_id?,
                    score: point.score,
                    metadata: point.payload.get(META_FIELD).cloned().and_then(qdrant_value_to_json),
                })
            })
            .collect();

        debug!(hits = hits.len(), "search complete");
        Ok(hits)
    }
}

fn payload_selector() -> WithPayloadSelector {
    WithPayloadSelector {
        selector_options: Some(with_payload_selector::SelectorOptions::Include(
            PayloadIncludeSelector {
                fields: vec![ITEM_ID_FIELD.to_string(), META_FIELD.to_string()],
            },
        )),
    }
}

/// Prefer the `item_id` payload field, fall back to a numeric point id
fn item_id_of(
    payload: &HashMap<String, QdrantValue>,
    point_id: Option<&qdrant::PointId>,
) -> Option<ItemId> {
    use qdrant::value::Kind;

    let from_payload = payload.get(ITEM_ID_FIELD).and_then(|v| match &v.kind {
        Some(Kind::IntegerValue(i)) => Some(*i),
        Some(Kind::StringValue(s)) => s.parse().ok(),
        _ => None,
    });

    from_payload.or_else(|| match point_id?.point_id_options.as_ref()? {
        PointIdOptions::Num(n) => ItemId::try_from(*n).ok(),
        PointIdOptions::Uuid(_) => None,
    })
}

fn vector_distance(config: &qdrant::CollectionConfig, vector_name: &str) -> Option<Distance> {
    let vectors = config.params.as_ref()?.vectors_config.as_ref()?.config.as_ref()?;
    match vectors {
        vectors_config::Config::Params(p) => Some(p.distance()),
        vectors_config::Config::ParamsMap(map) => map.map.get(vector_name).map(|p| p.distance()),
    }
}

fn qdrant_value_to_json(val: QdrantValue) -> Option<serde_json::Value> {
    use qdrant::value::Kind;

    match val.kind? {
        Kind::NullValue(_) => Some(serde_json::Value::Null),
        Kind::BoolValue(b) => Some(serde_json::Value::Bool(b)),
        Kind::IntegerValue(i) => Some(serde_json::Value::Number(i.into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(f).map(serde_json::Value::Number),
        Kind::StringValue(s) => Some(serde_json::Value::String(s)),
        Kind::ListValue(list) => Some(serde_json::Value::Array(
            list.values.into_iter().filter_map(qdrant_value_to_json).collect(),
        )),
        Kind::StructValue(s) => Some(serde_json::Value::Object(
            s.fields
                .into_iter()
                .filter_map(|(k, v)| qdrant_value_to_json(v).map(|v| (k, v)))
                .collect(),
        )),
    }
}
