//! Pooled HTTP client shared by provider adapters

use crate::config::HttpConfig;
use crate::http::error::{map_http_error, HttpError};
use crate::providers::error::ProviderError;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default user agent
const USER_AGENT: &str = concat!("promptwire/", env!("CARGO_PKG_VERSION"));

/// Process-wide client, created on first use
static SHARED: Mutex<Option<HttpClient>> = Mutex::new(None);

/// HTTP client with connection pooling and a bound on in-flight requests
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,

    /// One permit per allowed in-flight request
    permits: Arc<Semaphore>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("available_permits", &self.permits.available_permits())
            .field("max_response_size", &self.max_response_size)
            .finish()
    }
}

impl HttpClient {
    /// Create a client with default pool settings
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a client from pool settings.
    ///
    /// The transport never retries on its own; retries belong to the caller's
    /// retry policy.
    pub fn with_config(config: &HttpConfig) -> Result<Self, HttpError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
            max_response_size: config.max_response_size,
        })
    }

    /// The process-wide client, created with default settings on first use
    pub fn shared() -> Result<Self, HttpError> {
        Self::shared_with(&HttpConfig::default())
    }

    /// The process-wide client. `config` only applies if the client does not
    /// exist yet.
    pub fn shared_with(config: &HttpConfig) -> Result<Self, HttpError> {
        let mut guard = lock_shared();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = Self::with_config(config)?;
        debug!(
            max_connections = config.max_connections,
            max_idle_per_host = config.max_idle_per_host,
            "created shared HTTP client"
        );
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Drop the process-wide client.
    ///
    /// Pooled connections close once every clone still held by adapters is
    /// dropped. Returns whether a client existed.
    pub fn shutdown_shared() -> bool {
        let released = lock_shared().take().is_some();
        if released {
            info!("released shared HTTP client");
        }
        released
    }

    /// Whether the process-wide client currently exists
    pub fn has_shared() -> bool {
        lock_shared().is_some()
    }

    /// Free in-flight slots
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// POST `body` as JSON and decode a JSON response.
    ///
    /// Non-success statuses are mapped through [`map_http_error`].
    pub async fn post_json<B, R>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
        timeout: Duration,
    ) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request_id = Uuid::new_v4();

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::NetworkError {
                message: format!("HTTP client is shut down [request_id: {}]", request_id),
            })?;

        debug!(url, %request_id, "sending request");

        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .headers(headers)
            .header("X-Request-ID", request_id.to_string())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(url, %request_id, "request timed out");
                    ProviderError::Timeout
                } else if e.is_connect() {
                    error!(url, %request_id, error = %e, "connection failed");
                    ProviderError::NetworkError {
                        message: format!("Connection failed: {} [request_id: {}]", e, request_id),
                    }
                } else {
                    error!(url, %request_id, error = %e, "request failed");
                    ProviderError::NetworkError {
                        message: format!("{} [request_id: {}]", e, request_id),
                    }
                }
            })?;

        let status = response.status();
        debug!(%status, %request_id, "response received");

        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.ok();
            warn!(%status, %request_id, "request failed with non-success status");
            return Err(map_http_error(status, Some(&headers), body, request_id));
        }

        Self::validate_content_type(&response, request_id)?;
        self.check_content_length(response.content_length(), request_id)?;

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError {
                message: format!("Failed to read response body: {} [request_id: {}]", e, request_id),
            })?;
        self.check_content_length(Some(text.len() as u64), request_id)?;

        serde_json::from_str(&text).map_err(|e| {
            error!(%request_id, error = %e, "failed to parse response");
            ProviderError::ParseError(format!(
                "Invalid response format: {} [request_id: {}]",
                e, request_id
            ))
        })
    }

    fn validate_content_type(response: &Response, request_id: Uuid) -> Result<(), ProviderError> {
        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or("").to_lowercase();
            if !content_type.contains("application/json") {
                return Err(ProviderError::ParseError(format!(
                    "Expected application/json, got: {} [request_id: {}]",
                    content_type, request_id
                )));
            }
        }
        Ok(())
    }

    fn check_content_length(&self, length: Option<u64>, request_id: Uuid) -> Result<(), ProviderError> {
        match length {
            Some(length) if length > self.max_response_size as u64 => Err(ProviderError::Custom {
                code: "RESPONSE_TOO_LARGE".to_string(),
                message: format!(
                    "Response size {} exceeds maximum {} [request_id: {}]",
                    length, self.max_response_size, request_id
                ),
            }),
            _ => Ok(()),
        }
    }
}

fn lock_shared() -> MutexGuard<'static, Option<HttpClient>> {
    SHARED.lock().unwrap_or_else(|e| e.into_inner())
}
