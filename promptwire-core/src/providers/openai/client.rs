//! OpenAI chat model

use super::converter::{build_request, from_openai_response};
use super::types::OpenAIResponse;
use crate::config::{ConfigValidator, OpenAIConfig};
use crate::error::{LlmError, LlmResult};
use crate::http::HttpClient;
use crate::protocol::{Message, Tool};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::llm::{ChatModel, ModelResponse};
use crate::providers::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

/// Chat model backed by an OpenAI-compatible Chat Completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAIChat {
    config: OpenAIConfig,
    http: HttpClient,
}

impl OpenAIChat {
    /// Validate `config` and attach to the shared HTTP client
    pub fn new(config: OpenAIConfig) -> LlmResult<Self> {
        ConfigValidator::new()
            .validate(&config)
            .map_err(|e| LlmError::Config(e.into()))?;

        let http = HttpClient::shared_with(&config.http).map_err(|e| LlmError::NotInstalled {
            provider: "openai".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { config, http })
    }

    /// Use a dedicated HTTP client instead of the shared one
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    /// Build from `OPENAI_API_KEY` and friends
    pub fn from_env(model: impl Into<String>) -> LlmResult<Self> {
        Self::new(OpenAIConfig::from_env(model)?)
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let bearer = HeaderValue::from_str(&format!(
            "Bearer {}",
            self.config.api_key.expose_secret()
        ))
        .map_err(|_| ProviderError::AuthenticationError)?;
        headers.insert(AUTHORIZATION, bearer);

        if let Some(org_id) = &self.config.organization_id {
            let value = HeaderValue::from_str(org_id).map_err(|_| ProviderError::InvalidRequest {
                message: "organization id is not a valid header value".to_string(),
            })?;
            headers.insert("OpenAI-Organization", value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.llm.model
    }

    /// Vision models, plus the `gpt-4o` family which accepts image input natively
    fn supports_images(&self) -> bool {
        let model = self.config.llm.model.as_str();
        model.contains("vision") || model.starts_with("gpt-4o")
    }

    fn supports_audio(&self) -> bool {
        false
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.llm.max_retries)
    }

    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> ProviderResult<ModelResponse> {
        let request = build_request(&self.config, messages, tools);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = tools.len(),
            "requesting chat completion"
        );

        let response: OpenAIResponse = self
            .http
            .post_json(
                &self.config.completions_url(),
                self.build_headers()?,
                &request,
                self.config.request_timeout(),
            )
            .await?;

        from_openai_response(response)
    }
}
