//! # gRPC Client Library
//!
//! Channel construction with HTTP/2 tuning and request-correlation
//! interceptors for outgoing calls.
//!
//! ```ignore
//! use grpc_client::{ChannelConfig, create_channel_lazy_with_config};
//! use grpc_client::interceptors::client::ClientTracingInterceptor;
//!
//! let channel = create_channel_lazy_with_config("http://127.0.0.1:1301", ChannelConfig::default())?;
//! let client = ImagePredictionClient::with_interceptor(
//!     channel,
//!     ClientTracingInterceptor::with_service_name("prediction-api"),
//! );
//! ```

pub mod channel;
pub mod error;
pub mod interceptors;

pub use channel::{
  ChannelConfig, create_channel, create_channel_lazy, create_channel_lazy_with_config,
  create_channel_with_config,
};
pub use error::{GrpcError, GrpcResult};
pub use interceptors::client::{ClientTracingInterceptor, MetadataExtractor, REQUEST_ID_HEADER};
