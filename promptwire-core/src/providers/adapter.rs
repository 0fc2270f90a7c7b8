//! Provider selection
//!
//! Adapters are compiled in through cargo features. Asking for one that is not
//! compiled in fails at construction with [`LlmError::NotInstalled`](crate::error::LlmError::NotInstalled).

use crate::config::{OpenAIConfig, ProviderType};
use crate::error::LlmResult;
use crate::providers::llm::{ChatModel, Llm};
use std::sync::Arc;

/// Whether the adapter for `provider` was compiled in
pub fn is_available(provider: ProviderType) -> bool {
    match provider {
        ProviderType::OpenAI => cfg!(feature = "openai"),
    }
}

/// Create the chat model for `provider`
pub fn create_chat_model(provider: ProviderType, config: OpenAIConfig) -> LlmResult<Arc<dyn ChatModel>> {
    match provider {
        ProviderType::OpenAI => openai_model(config),
    }
}

/// Create an [`Llm`] for `provider` using the model's declared retry policy
pub fn create_llm(provider: ProviderType, config: OpenAIConfig) -> LlmResult<Llm> {
    create_chat_model(provider, config).map(Llm::from_arc)
}

#[cfg(feature = "openai")]
fn openai_model(config: OpenAIConfig) -> LlmResult<Arc<dyn ChatModel>> {
    Ok(Arc::new(crate::providers::openai::OpenAIChat::new(config)?))
}

#[cfg(not(feature = "openai"))]
fn openai_model(_config: OpenAIConfig) -> LlmResult<Arc<dyn ChatModel>> {
    Err(crate::error::LlmError::NotInstalled {
        provider: ProviderType::OpenAI.to_string(),
        reason: "built without the `openai` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "openai")]
    #[test]
    fn test_create_openai_llm() {
        let llm = create_llm(ProviderType::OpenAI, OpenAIConfig::new("gpt-4o", "sk-test")).unwrap();
        assert_eq!(llm.name(), "openai");
        assert_eq!(llm.model(), "gpt-4o");
        assert_eq!(llm.retry_policy().max_retries, 8);
        assert!(is_available(ProviderType::OpenAI));
    }

    #[cfg(not(feature = "openai"))]
    #[test]
    fn test_missing_feature_is_not_installed() {
        let result = create_llm(ProviderType::OpenAI, OpenAIConfig::new("gpt-4o", "sk-test"));
        assert!(matches!(result, Err(crate::error::LlmError::NotInstalled { .. })));
    }

    #[test]
    fn test_invalid_config_surfaces() {
        let result = create_llm(ProviderType::OpenAI, OpenAIConfig::new("", "sk-test"));
        assert!(result.is_err());
    }
}
