//! Configuration validation beyond the per-struct checks

use super::error::{ValidationError, ValidationErrorKind};
use super::schema::OpenAIConfig;
use regex::Regex;
use tracing::warn;

/// Validator with rules spanning several fields
pub struct ConfigValidator {
    /// Matches leftover `${VAR}` placeholders
    placeholder_pattern: Regex,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self {
            placeholder_pattern: Regex::new(r"\$\{[^}]*\}").expect("valid placeholder pattern"),
        }
    }

    /// Validate an OpenAI adapter configuration
    pub fn validate(&self, config: &OpenAIConfig) -> Result<(), ValidationError> {
        config.validate()?;
        self.validate_placeholders(config)?;
        self.check_key_shape(config);
        Ok(())
    }

    /// Reject values whose placeholders survived interpolation
    fn validate_placeholders(&self, config: &OpenAIConfig) -> Result<(), ValidationError> {
        let fields = [
            ("api_key", config.api_key.expose_secret()),
            ("base_url", config.base_url.as_str()),
            ("model", config.llm.model.as_str()),
        ];

        for (path, value) in fields {
            if self.placeholder_pattern.is_match(value) {
                return Err(ValidationError::new(
                    path,
                    ValidationErrorKind::InvalidValue {
                        expected: "interpolated value".to_string(),
                        actual: "unresolved placeholder".to_string(),
                    },
                ));
            }
        }

        Ok(())
    }

    /// Keys with surrounding whitespace are almost always copy-paste mistakes
    fn check_key_shape(&self, config: &OpenAIConfig) {
        let key = config.api_key.expose_secret();
        if key.trim() != key {
            warn!(
                key = %config.api_key.partial_redact(),
                "api_key has leading or trailing whitespace"
            );
        }
    }
}
