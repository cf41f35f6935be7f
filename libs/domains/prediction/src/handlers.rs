//! HTTP surface for image prediction

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};
use bytes::Bytes;
use md5::{Digest, Md5};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::error::UploadError;
use crate::models::{ImageFingerprint, Item, PredictResponse};
use crate::pipeline::PredictionPipeline;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];

#[derive(OpenApi)]
#[openapi(
    paths(predict_image),
    components(schemas(PredictResponse, Item, PredictUpload)),
    tags(
        (name = "prediction", description = "Find catalog items similar to an image")
    )
)]
pub struct PredictionApiDoc;

#[derive(Clone)]
pub struct PredictionState {
    pub pipeline: Arc<PredictionPipeline>,
    /// Compare the uploaded `md5` field with the digest of the image bytes
    pub verify_md5: bool,
}

impl PredictionState {
    pub fn new(pipeline: Arc<PredictionPipeline>) -> Self {
        Self {
            pipeline,
            verify_md5: true,
        }
    }
}

/// Multipart form accepted by the predict endpoint
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct PredictUpload {
    /// PNG or JPEG bytes
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
    /// Hex MD5 digest of `image`
    md5: String,
}

pub fn router(state: PredictionState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/image/predict", post(predict_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Predict similar items for an uploaded image
#[utoipa::path(
    post,
    path = "/api/image/predict",
    tag = "prediction",
    request_body(content = PredictUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Pipeline ran; errorCode 0 on success, 1004/1008/1010 otherwise", body = PredictResponse),
        (status = 400, description = "Upload rejected (1001 invalid, 1002 md5 mismatch, 1003 unsupported type)", body = PredictResponse)
    )
)]
pub async fn predict_image(
    State(state): State<PredictionState>,
    multipart: Multipart,
) -> Result<Json<PredictResponse>, UploadError> {
    let (fingerprint, image) = read_upload(multipart, state.verify_md5).await?;
    let response = state.pipeline.predict(&fingerprint, image).await;
    Ok(Json(response))
}

async fn read_upload(
    mut multipart: Multipart,
    verify_md5: bool,
) -> Result<(ImageFingerprint, Bytes), UploadError> {
    let mut image = None;
    let mut md5 = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => image = Some(field.bytes().await?),
            Some("md5") => md5 = Some(field.text().await?),
            _ => {}
        }
    }

    let image = image.ok_or_else(|| UploadError::Invalid("missing image field".to_string()))?;
    let md5 = md5.ok_or_else(|| UploadError::Invalid("missing md5 field".to_string()))?;

    if image.is_empty() {
        return Err(UploadError::EmptyImage);
    }

    let fingerprint = ImageFingerprint::parse_md5(&md5)?;
    if verify_md5 && md5_hex(&image) != fingerprint.as_str() {
        return Err(UploadError::Md5Mismatch);
    }

    if !is_supported_image(&image) {
        return Err(UploadError::UnsupportedImageType);
    }

    Ok((fingerprint, image))
}

fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

fn is_supported_image(data: &[u8]) -> bool {
    data.starts_with(PNG_MAGIC) || data.starts_with(JPEG_MAGIC)
}
