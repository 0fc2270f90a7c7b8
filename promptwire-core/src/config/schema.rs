//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default OpenAI-compatible endpoint
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Supported provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            other => Err(ValidationError::invalid_value("provider", "openai", other)),
        }
    }
}

/// Settings every chat model recognizes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Model identifier sent to the provider
    pub model: String,

    /// Sampling temperature; 0.0 leans deterministic
    #[serde(default)]
    pub temperature: f32,

    /// Optional sampling seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            seed: None,
            max_retries: default_max_retries(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validate model settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::required(join(path, "model")));
        }

        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::out_of_range(
                join(path, "temperature"),
                "Must be between 0.0 and 2.0",
            ));
        }

        Ok(())
    }
}

/// Pool settings for the shared transport client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Upper bound on in-flight requests; excess callers wait
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Idle keep-alive connections kept per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,

    /// Largest accepted response body in bytes
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_idle_per_host: default_max_idle(),
            connect_timeout_secs: default_connect_timeout(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            max_response_size: default_max_response_size(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    /// Validate pool settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.max_connections == 0 {
            return Err(ValidationError::out_of_range(
                join(path, "max_connections"),
                "Must be greater than 0",
            ));
        }

        if self.max_response_size == 0 {
            return Err(ValidationError::out_of_range(
                join(path, "max_response_size"),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Settings of the OpenAI chat adapter
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OpenAIConfig {
    #[serde(flatten)]
    pub llm: LlmConfig,

    /// API key (supports `${VAR}` interpolation when loaded from a file)
    pub api_key: SecretString,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shared client pool settings, applied when the pool is first created
    #[serde(default)]
    pub http: HttpConfig,
}

impl OpenAIConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            llm: LlmConfig::new(model),
            api_key: api_key.into(),
            base_url: default_base_url(),
            organization_id: None,
            request_timeout_secs: default_request_timeout(),
            http: HttpConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Validate the adapter configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.llm.validate("")?;

        if self.api_key.is_empty() {
            return Err(ValidationError::required("api_key"));
        }

        if self.base_url.is_empty() {
            return Err(ValidationError::required("base_url"));
        }

        match url::Url::parse(&self.base_url) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::new(
                        "base_url",
                        ValidationErrorKind::InvalidUrl {
                            message: format!(
                                "URL scheme must be http or https, got: {}",
                                url.scheme()
                            ),
                        },
                    ));
                }
            }
            Err(e) => {
                return Err(ValidationError::new(
                    "base_url",
                    ValidationErrorKind::InvalidUrl {
                        message: e.to_string(),
                    },
                ));
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::out_of_range(
                "request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        self.http.validate("http")
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

// Default value functions for serde
fn default_max_retries() -> u32 { 8 }
fn default_base_url() -> String { DEFAULT_OPENAI_BASE_URL.to_string() }
fn default_request_timeout() -> u64 { 60 }
fn default_max_connections() -> usize { 1000 }
fn default_max_idle() -> usize { 100 }
fn default_connect_timeout() -> u64 { 10 }
fn default_pool_idle_timeout() -> u64 { 90 }
fn default_max_response_size() -> usize { 10 * 1024 * 1024 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_defaults() {
        let config: LlmConfig = serde_yaml::from_str("model: gpt-4o").unwrap();
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.seed, None);
        assert_eq!(config.max_retries, 8);
    }

    #[test]
    fn test_openai_flattened_fields() {
        let yaml = r#"
model: gpt-4o-mini
temperature: 0.3
seed: 42
api_key: sk-test
"#;
        let config: OpenAIConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.seed, Some(42));
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.http.max_idle_per_host, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_temperature_out_of_range() {
        let config = OpenAIConfig::new("gpt-4o", "sk-test")
            .with_llm(LlmConfig::new("gpt-4o").with_temperature(2.5));
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "temperature");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = OpenAIConfig::new("gpt-4o", "sk-test").with_base_url("ftp://example.com");
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "base_url");
        assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let config = OpenAIConfig::new("gpt-4o", "sk").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_provider_type_parse() {
        assert_eq!("OpenAI".parse::<ProviderType>().unwrap(), ProviderType::OpenAI);
        assert!("cohere".parse::<ProviderType>().is_err());
    }
}
