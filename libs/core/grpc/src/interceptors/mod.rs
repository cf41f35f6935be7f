pub use tonic::service::Interceptor;

pub mod client;
