use async_trait::async_trait;
use bytes::Bytes;
use grpc_client::{
    ChannelConfig, ClientTracingInterceptor, GrpcResult, REQUEST_ID_HEADER,
    create_channel_lazy_with_config,
};
use protos::prediction::v1::{
    ImagePredictionRequest, image_prediction_client::ImagePredictionClient,
    image_prediction_server::SERVICE_NAME,
};
use std::time::Duration;
use tonic::codegen::InterceptedService;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic_health::pb::{
    HealthCheckRequest, health_check_response::ServingStatus, health_client::HealthClient,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::EmbeddingClient;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::models::EmbeddingVector;

type TracedChannel = InterceptedService<Channel, ClientTracingInterceptor>;

/// Embedding client over one shared, lazily connected channel.
///
/// Cloning is cheap; clones multiplex over the same HTTP/2 connection.
#[derive(Clone)]
pub struct GrpcEmbeddingClient {
    client: ImagePredictionClient<TracedChannel>,
    health: HealthClient<Channel>,
    model: String,
}

impl GrpcEmbeddingClient {
    pub fn new(channel: Channel, model: impl Into<String>) -> Self {
        let client = ImagePredictionClient::with_interceptor(
            channel.clone(),
            ClientTracingInterceptor::with_service_name("prediction-api"),
        )
        .max_decoding_message_size(16 * 1024 * 1024);

        Self {
            client,
            health: HealthClient::new(channel),
            model: model.into(),
        }
    }

    /// Build the client without dialing; the first call connects
    pub fn connect_lazy(config: &EmbeddingConfig) -> GrpcResult<Self> {
        let channel = create_channel_lazy_with_config(config.url.clone(), ChannelConfig::default())?;
        Ok(Self::new(channel, config.model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `grpc.health.v1.Health/Check` against the prediction service
    pub async fn check_health(&self, timeout: Duration) -> Result<(), EmbeddingError> {
        let mut health = self.health.clone();
        let request = HealthCheckRequest {
            service: SERVICE_NAME.to_string(),
        };

        let response = tokio::time::timeout(timeout, health.check(request))
            .await
            .map_err(|_| EmbeddingError::Timeout(timeout))?
            .map_err(|status| EmbeddingError::from_status(status, timeout))?;

        match response.into_inner().status() {
            ServingStatus::Serving => Ok(()),
            status => Err(EmbeddingError::Unavailable(format!(
                "health status {}",
                status.as_str_name()
            ))),
        }
    }

    async fn exchange(
        &self,
        image: Bytes,
        request_id: Uuid,
        deadline: Duration,
    ) -> Result<EmbeddingVector, EmbeddingError> {
        let message = ImagePredictionRequest {
            model: self.model.clone(),
            request_id: request_id.to_string(),
            image: image.to_vec(),
        };

        // A one-item stream ends after its only message, closing the send side.
        let mut request = tonic::Request::new(tokio_stream::once(message));
        request.set_timeout(deadline);
        if let Ok(value) = MetadataValue::try_from(request_id.to_string()) {
            request.metadata_mut().insert(REQUEST_ID_HEADER, value);
        }

        let mut client = self.client.clone();
        let into_error = |status: tonic::Status| EmbeddingError::from_status(status, deadline);
        let mut stream = client.predict(request).await.map_err(into_error)?.into_inner();

        let response = stream
            .message()
            .await
            .map_err(into_error)?
            .ok_or(EmbeddingError::EmptyResponse)?;

        if response.vector.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }

        Ok(EmbeddingVector(response.vector))
    }
}

#[async_trait]
impl EmbeddingClient for GrpcEmbeddingClient {
    #[instrument(skip(self, image), fields(model = %self.model, image_bytes = image.len()))]
    async fn embed(
        &self,
        image: Bytes,
        request_id: Uuid,
        deadline: Duration,
    ) -> Result<EmbeddingVector, EmbeddingError> {
        let vector = tokio::time::timeout(deadline, self.exchange(image, request_id, deadline))
            .await
            .map_err(|_| EmbeddingError::Timeout(deadline))??;

        debug!(dimension = vector.dimension(), "embedding received");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protos::prediction::v1::ImageVectorResponse;
    use protos::prediction::v1::image_prediction_server::{ImagePrediction, ImagePredictionServer};
    use std::pin::Pin;
    use tokio::net::TcpListener;
    use tokio_stream::{Stream, StreamExt, wrappers::TcpListenerStream};
    use tonic::{Request, Response, Status, Streaming};

    type VectorStream = Pin<Box<dyn Stream<Item = Result<ImageVectorResponse, Status>> + Send>>;

    /// Echoes the image length as a one-element vector, or misbehaves on demand
    struct FakeModel {
        reply: Option<Vec<f32>>,
        delay: Duration,
    }

    #[tonic::async_trait]
    impl ImagePrediction for FakeModel {
        type PredictStream = VectorStream;

        async fn predict(
            &self,
            request: Request<Streaming<ImagePredictionRequest>>,
        ) -> Result<Response<Self::PredictStream>, Status> {
            let header_id = request
                .metadata()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let mut inbound = request.into_inner();
            let first = inbound
                .next()
                .await
                .ok_or_else(|| Status::invalid_argument("no request"))??;

            if header_id.as_deref() != Some(first.request_id.as_str()) {
                return Err(Status::invalid_argument("request id mismatch"));
            }
            tokio::time::sleep(self.delay).await;

            let vector = match &self.reply {
                Some(v) => v.clone(),
                None => vec![first.image.len() as f32],
            };
            let out = tokio_stream::once(Ok(ImageVectorResponse { vector }));
            Ok(Response::new(Box::pin(out)))
        }
    }

    async fn serve(model: FakeModel) -> GrpcEmbeddingClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(
            tonic::transport::Server::builder()
                .add_service(ImagePredictionServer::new(model))
                .serve_with_incoming(TcpListenerStream::new(listener)),
        );

        let config = EmbeddingConfig {
            url: format!("http://{addr}"),
            model: "image2vec".to_string(),
        };
        GrpcEmbeddingClient::connect_lazy(&config).unwrap()
    }

    #[tokio::test]
    async fn test_embed_round_trip() {
        let client = serve(FakeModel {
            reply: None,
            delay: Duration::ZERO,
        })
        .await;

        let vector = client
            .embed(Bytes::from_static(b"abcd"), Uuid::new_v4(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(vector, EmbeddingVector(vec![4.0]));
    }

    #[tokio::test]
    async fn test_empty_vector_is_error() {
        let client = serve(FakeModel {
            reply: Some(vec![]),
            delay: Duration::ZERO,
        })
        .await;

        let err = client
            .embed(Bytes::from_static(b"x"), Uuid::new_v4(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, EmbeddingError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        let client = serve(FakeModel {
            reply: None,
            delay: Duration::from_secs(5),
        })
        .await;

        let err = client
            .embed(Bytes::from_static(b"x"), Uuid::new_v4(), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, EmbeddingError::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let config = EmbeddingConfig {
            url: "http://127.0.0.1:1".to_string(),
            model: "image2vec".to_string(),
        };
        let client = GrpcEmbeddingClient::connect_lazy(&config).unwrap();

        let err = client
            .embed(Bytes::from_static(b"x"), Uuid::new_v4(), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::Unavailable(_) | EmbeddingError::Timeout(_) | EmbeddingError::Rpc(_)
        ));
    }
}
