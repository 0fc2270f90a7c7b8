//! HTTP layer for provider adapters
//!
//! A single pooled [`HttpClient`] is shared by every adapter in the process.
//! It bounds in-flight requests, tags each request with an `X-Request-ID` and
//! maps failed responses onto [`ProviderError`](crate::providers::ProviderError).

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::{map_http_error, parse_retry_after, HttpError};
