//! Request correlation for outgoing gRPC calls
//!
//! Every request leaves with a `traceparent` and an `x-request-id`. A
//! request id already set by the caller is kept, so an id minted at the HTTP
//! edge survives the hop to the downstream service.

use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::{Request, Status};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const TRACEPARENT_HEADER: &str = "traceparent";
const SOURCE_SERVICE_HEADER: &str = "x-source-service";

/// Injects correlation headers into outgoing requests
///
/// ```ignore
/// let client = ImagePredictionClient::with_interceptor(
///     channel,
///     ClientTracingInterceptor::with_service_name("prediction-api"),
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClientTracingInterceptor {
    service_name: Option<String>,
}

impl ClientTracingInterceptor {
    pub fn new() -> Self {
        Self { service_name: None }
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: Some(service_name.into()),
        }
    }

    /// W3C traceparent: `{version}-{trace_id}-{parent_id}-{flags}`
    fn generate_traceparent(trace_id: &str) -> String {
        let span_id = &uuid::Uuid::new_v4().as_simple().to_string()[..16];
        format!("00-{trace_id}-{span_id}-01")
    }
}

impl tonic::service::Interceptor for ClientTracingInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata_mut();

        if let Some(name) = &self.service_name {
            if let Ok(value) = MetadataValue::try_from(name.as_str()) {
                metadata.insert(SOURCE_SERVICE_HEADER, value);
            }
        }

        let request_id = match MetadataExtractor(metadata).request_id() {
            Some(existing) => existing,
            None => {
                let generated = uuid::Uuid::new_v4().to_string();
                let value = MetadataValue::try_from(generated.as_str())
                    .map_err(|_| Status::internal("Failed to create request ID"))?;
                metadata.insert(REQUEST_ID_HEADER, value);
                generated
            }
        };

        if !metadata.contains_key(TRACEPARENT_HEADER) {
            let trace_id = uuid::Uuid::new_v4().as_simple().to_string();
            let traceparent = Self::generate_traceparent(&trace_id);
            let value = MetadataValue::try_from(traceparent.as_str())
                .map_err(|_| Status::internal("Failed to create traceparent header"))?;
            metadata.insert(TRACEPARENT_HEADER, value);
        }

        tracing::debug!(target: "grpc_client", request_id = %request_id, "outgoing gRPC request");

        Ok(request)
    }
}

/// Read correlation headers back out of gRPC metadata
pub struct MetadataExtractor<'a>(pub &'a MetadataMap);

impl MetadataExtractor<'_> {
    pub fn trace_id(&self) -> Option<String> {
        self.traceparent_part(1)
    }

    pub fn span_id(&self) -> Option<String> {
        self.traceparent_part(2)
    }

    pub fn request_id(&self) -> Option<String> {
        self.0
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    fn traceparent_part(&self, index: usize) -> Option<String> {
        self.0
            .get(TRACEPARENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|tp| tp.split('-').nth(index))
            .map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::service::Interceptor;

    #[test]
    fn test_generates_request_id_and_traceparent() {
        let req = ClientTracingInterceptor::new().call(Request::new(())).unwrap();

        let id = MetadataExtractor(req.metadata()).request_id().unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let tp = req.metadata().get("traceparent").unwrap().to_str().unwrap();
        let parts: Vec<&str> = tp.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "00");
        assert_eq!(parts[1].len(), 32);
        assert_eq!(parts[2].len(), 16);
        assert_eq!(parts[3], "01");
    }

    #[test]
    fn test_keeps_caller_request_id() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert(REQUEST_ID_HEADER, "edge-42".parse().unwrap());

        let req = ClientTracingInterceptor::new().call(request).unwrap();

        assert_eq!(
            MetadataExtractor(req.metadata()).request_id().as_deref(),
            Some("edge-42")
        );
    }

    #[test]
    fn test_with_service_name() {
        let req = ClientTracingInterceptor::with_service_name("prediction-api")
            .call(Request::new(()))
            .unwrap();

        let source = req.metadata().get("x-source-service").unwrap();
        assert_eq!(source.to_str().unwrap(), "prediction-api");
    }

    #[test]
    fn test_metadata_extractor() {
        let mut metadata = MetadataMap::new();
        metadata.insert(
            "traceparent",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
                .parse()
                .unwrap(),
        );

        let extractor = MetadataExtractor(&metadata);
        assert_eq!(
            extractor.trace_id().as_deref(),
            Some("0af7651916cd43dd8448eb211c80319c")
        );
        assert_eq!(extractor.span_id().as_deref(), Some("b7ad6b7169203331"));
        assert_eq!(extractor.request_id(), None);
    }
}
