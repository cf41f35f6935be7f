use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::FingerprintError;

/// Catalog item identifier as stored in the index and the relational store
pub type ItemId = i64;

/// Fewest cached ids a response-cache entry may hold and still be served
pub const MIN_CACHED_IDS: usize = 10;

/// Neighbors requested from the vector index per prediction
pub const DEFAULT_TOP_K: u64 = 20;

/// Content hash that identifies an uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageFingerprint(String);

impl ImageFingerprint {
    /// Accepts any non-empty key. The pipeline treats it as opaque.
    pub fn new(value: impl Into<String>) -> Result<Self, FingerprintError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(FingerprintError::Empty);
        }
        Ok(Self(value))
    }

    /// Parse a client supplied MD5 digest (32 hex chars), normalized to lowercase
    pub fn parse_md5(value: &str) -> Result<Self, FingerprintError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(FingerprintError::Empty);
        }
        if value.len() != 32 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FingerprintError::NotMd5(value.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feature vector produced by the embedding service
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddingVector(pub Vec<f32>);

impl EmbeddingVector {
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Item ids in rank order. Position is the rank.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RankedIdList(Vec<ItemId>);

impl RankedIdList {
    pub fn new(ids: Vec<ItemId>) -> Self {
        Self(ids)
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A cached list is only served when it holds at least `min` ids
    pub fn is_authoritative(&self, min: usize) -> bool {
        self.0.len() >= min
    }
}

impl From<Vec<ItemId>> for RankedIdList {
    fn from(ids: Vec<ItemId>) -> Self {
        Self(ids)
    }
}

/// One neighbor returned by the vector index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub item_id: ItemId,
    pub score: f32,
    /// Opaque `meta` payload, passed through untouched
    pub metadata: Option<serde_json::Value>,
}

impl SearchHit {
    pub fn new(item_id: ItemId, score: f32) -> Self {
        Self {
            item_id,
            score,
            metadata: None,
        }
    }
}

/// Item metadata as cached and as stored. Carries no rank.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    #[serde(default)]
    pub title: String,
    pub item_id: ItemId,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub owner_avatar_url: String,
}

impl ItemMetadata {
    /// Empty record for an id whose metadata could not be resolved
    pub fn placeholder(item_id: ItemId) -> Self {
        Self {
            item_id,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn ranked(self, rank: usize) -> Item {
        Item {
            title: self.title,
            item_id: self.item_id,
            thumbnail_url: self.thumbnail_url,
            owner_name: self.owner_name,
            owner_avatar_url: self.owner_avatar_url,
            rank,
        }
    }
}

/// A resolved item at its position in the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub title: String,
    pub item_id: ItemId,
    pub thumbnail_url: String,
    pub owner_name: String,
    pub owner_avatar_url: String,
    /// Zero-based position in the ranked list
    pub rank: usize,
}

impl Item {
    pub fn metadata(&self) -> ItemMetadata {
        ItemMetadata {
            title: self.title.clone(),
            item_id: self.item_id,
            thumbnail_url: self.thumbnail_url.clone(),
            owner_name: self.owner_name.clone(),
            owner_avatar_url: self.owner_avatar_url.clone(),
        }
    }
}

/// Envelope returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    /// 0 on success
    pub error_code: u32,
    pub error: String,
    pub contents: Vec<Item>,
}

impl PredictResponse {
    pub fn success(contents: Vec<Item>) -> Self {
        Self {
            error_code: 0,
            error: String::new(),
            contents,
        }
    }

    pub fn failure(error_code: u32, error: impl Into<String>) -> Self {
        Self {
            error_code,
            error: error.into(),
            contents: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }
}
