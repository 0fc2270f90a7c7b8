//! Configuration for chat models and the shared transport
//!
//! Configurations can be built in code, read from the environment with
//! [`OpenAIConfig::from_env`], or loaded from YAML / JSON files in which
//! `${VAR}` placeholders are replaced by environment variables.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::interpolate_env_vars;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{HttpConfig, LlmConfig, OpenAIConfig, ProviderType, DEFAULT_OPENAI_BASE_URL};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Environment variable holding the OpenAI API key
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Optional override of the OpenAI endpoint
pub const OPENAI_BASE_URL_VAR: &str = "OPENAI_BASE_URL";
/// Optional OpenAI organization
pub const OPENAI_ORG_ID_VAR: &str = "OPENAI_ORG_ID";

impl OpenAIConfig {
    /// Build a configuration for `model` from `OPENAI_API_KEY`, `OPENAI_BASE_URL`
    /// and `OPENAI_ORG_ID`
    pub fn from_env(model: impl Into<String>) -> ConfigResult<Self> {
        let api_key = env::non_empty_var(OPENAI_API_KEY_VAR).ok_or_else(|| {
            ConfigError::EnvVarNotFound {
                var: OPENAI_API_KEY_VAR.to_string(),
            }
        })?;

        let mut config = OpenAIConfig::new(model, api_key);
        if let Some(base_url) = env::non_empty_var(OPENAI_BASE_URL_VAR) {
            config.base_url = base_url;
        }
        config.organization_id = env::non_empty_var(OPENAI_ORG_ID_VAR);

        ConfigValidator::new().validate(&config)?;
        Ok(config)
    }
}

fn read_interpolated(path: &Path) -> ConfigResult<String> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    env::interpolate_env_vars(&content)
}

/// Load an OpenAI configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<OpenAIConfig> {
    let path = path.as_ref();
    let interpolated = read_interpolated(path)?;

    let config: OpenAIConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Load an OpenAI configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<OpenAIConfig> {
    let path = path.as_ref();
    let interpolated = read_interpolated(path)?;

    let config: OpenAIConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}
