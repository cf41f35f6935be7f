use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::models::PredictResponse;

pub const CODE_INVALID_REQUEST: u32 = 1001;
pub const CODE_MD5_MISMATCH: u32 = 1002;
pub const CODE_UNSUPPORTED_IMAGE: u32 = 1003;
pub const CODE_EMBEDDING_FAILED: u32 = 1004;
pub const CODE_SEARCH_FAILED: u32 = 1008;
pub const CODE_NO_MATCH: u32 = 1010;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("fingerprint is empty")]
    Empty,

    #[error("fingerprint is not an md5 hex digest: {0}")]
    NotMd5(String),
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("embedding call timed out after {0:?}")]
    Timeout(Duration),

    #[error("embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("embedding rpc failed: {0}")]
    Rpc(String),

    #[error("embedding service returned no vector")]
    EmptyResponse,
}

impl EmbeddingError {
    /// Classify an RPC status from a call that was given `deadline`.
    ///
    /// A server-side `DeadlineExceeded` and the client's own "Timeout expired"
    /// cancellation both mean the deadline elapsed.
    pub fn from_status(status: tonic::Status, deadline: Duration) -> Self {
        match status.code() {
            tonic::Code::DeadlineExceeded => EmbeddingError::Timeout(deadline),
            tonic::Code::Cancelled if status.message().contains(CLIENT_TIMEOUT_MESSAGE) => {
                EmbeddingError::Timeout(deadline)
            }
            tonic::Code::Unavailable => EmbeddingError::Unavailable(status.message().to_string()),
            code => EmbeddingError::Rpc(format!("{code:?}: {}", status.message())),
        }
    }
}

/// Message tonic attaches to a request cancelled by its own timeout
const CLIENT_TIMEOUT_MESSAGE: &str = "Timeout expired";

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("vector search timed out after {0:?}")]
    Timeout(Duration),

    #[error("vector index error: {0}")]
    Backend(String),

    #[error("collection {collection} is not usable: {reason}")]
    InvalidCollection { collection: String, reason: String },
}

impl From<qdrant_client::QdrantError> for SearchError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        SearchError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache call timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache entry could not be decoded: {0}")]
    Codec(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

/// Terminal outcome of a failed prediction.
///
/// Cache and store problems never surface here; they degrade instead.
#[derive(Debug, Clone, Error)]
pub enum PredictionError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    #[error("no similar items found")]
    NoMatchFound,
}

impl PredictionError {
    pub fn error_code(&self) -> u32 {
        match self {
            PredictionError::Embedding(_) => CODE_EMBEDDING_FAILED,
            PredictionError::Search(_) => CODE_SEARCH_FAILED,
            PredictionError::NoMatchFound => CODE_NO_MATCH,
        }
    }

    /// Caller-facing message. Upstream details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            PredictionError::Embedding(_) => "image prediction failed",
            PredictionError::Search(_) => "image recommendation failed",
            PredictionError::NoMatchFound => "no suitable match",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Embedding(_) => "embedding",
            PredictionError::Search(_) => "search",
            PredictionError::NoMatchFound => "no_match",
        }
    }
}

impl From<PredictionError> for PredictResponse {
    fn from(err: PredictionError) -> Self {
        PredictResponse::failure(err.error_code(), err.user_message())
    }
}

/// Upload rejected before it reaches the pipeline
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("image is empty")]
    EmptyImage,

    #[error("md5 does not match the uploaded image")]
    Md5Mismatch,

    #[error("image must be png or jpeg")]
    UnsupportedImageType,
}

impl UploadError {
    pub fn error_code(&self) -> u32 {
        match self {
            UploadError::Invalid(_) | UploadError::EmptyImage => CODE_INVALID_REQUEST,
            UploadError::Md5Mismatch => CODE_MD5_MISMATCH,
            UploadError::UnsupportedImageType => CODE_UNSUPPORTED_IMAGE,
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for UploadError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        UploadError::Invalid(err.body_text())
    }
}

impl From<FingerprintError> for UploadError {
    fn from(err: FingerprintError) -> Self {
        UploadError::Invalid(err.to_string())
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "rejected upload");
        let body = PredictResponse::failure(self.error_code(), self.to_string());
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_error_codes() {
        let embed = PredictionError::from(EmbeddingError::Timeout(Duration::from_secs(30)));
        let search = PredictionError::from(SearchError::Backend("down".into()));

        assert_eq!(embed.error_code(), 1004);
        assert_eq!(search.error_code(), 1008);
        assert_eq!(PredictionError::NoMatchFound.error_code(), 1010);
    }

    #[test]
    fn test_user_message_hides_upstream_detail() {
        let err = PredictionError::from(EmbeddingError::Rpc("Internal: gpu 3 oom".into()));
        let resp = PredictResponse::from(err);

        assert_eq!(resp.error, "image prediction failed");
        assert!(!resp.error.contains("gpu"));
    }

    #[test]
    fn test_status_unavailable_maps_to_unavailable() {
        let deadline = Duration::from_secs(30);
        let err = EmbeddingError::from_status(tonic::Status::unavailable("connection refused"), deadline);
        assert!(matches!(err, EmbeddingError::Unavailable(_)));

        let err = EmbeddingError::from_status(tonic::Status::internal("boom"), deadline);
        assert!(matches!(err, EmbeddingError::Rpc(msg) if msg.contains("boom")));
    }

    #[test]
    fn test_elapsed_deadline_statuses_map_to_timeout() {
        let deadline = Duration::from_millis(100);

        let err = EmbeddingError::from_status(tonic::Status::deadline_exceeded("deadline"), deadline);
        assert!(matches!(err, EmbeddingError::Timeout(d) if d == deadline));

        let err = EmbeddingError::from_status(tonic::Status::cancelled("Timeout expired"), deadline);
        assert!(matches!(err, EmbeddingError::Timeout(d) if d == deadline));

        let err = EmbeddingError::from_status(tonic::Status::cancelled("client went away"), deadline);
        assert!(matches!(err, EmbeddingError::Rpc(_)));
    }

    #[test]
    fn test_upload_error_codes() {
        assert_eq!(UploadError::EmptyImage.error_code(), 1001);
        assert_eq!(UploadError::Md5Mismatch.error_code(), 1002);
        assert_eq!(UploadError::UnsupportedImageType.error_code(), 1003);
        assert_eq!(
            UploadError::from(FingerprintError::Empty).error_code(),
            1001
        );
    }
}
