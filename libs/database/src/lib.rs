//! Connection helpers for the backing stores of the prediction service.
//!
//! - `redis`: `ConnectionManager` setup, retrying connects and a PING probe
//! - `postgres`: SeaORM pool setup from [`postgres::PostgresConfig`] and a `SELECT 1` probe
//! - `common`: shared error type and exponential backoff
//!
//! With the `config` feature enabled both config types implement
//! `core_config::FromEnv`.

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use common::{DatabaseError, DatabaseResult, RetryConfig, retry, retry_with_backoff};
