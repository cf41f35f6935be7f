//! Interceptors applied to outgoing gRPC calls

pub mod tracing;

pub use tracing::{ClientTracingInterceptor, MetadataExtractor, REQUEST_ID_HEADER};
