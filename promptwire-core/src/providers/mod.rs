//! Provider layer
//!
//! [`llm::Llm`] drives any [`llm::ChatModel`] through the retry loop defined in
//! [`retry`]. Concrete adapters live in per-provider modules behind cargo
//! features.

pub mod adapter;
pub mod error;
pub mod llm;
#[cfg(feature = "openai")]
pub mod openai;
pub mod retry;

pub use adapter::{create_chat_model, create_llm, is_available};
pub use error::{ErrorKind, ProviderError, ProviderResult};
pub use llm::{ChatModel, Llm, ModelResponse, Prediction, RawToolCall};
#[cfg(feature = "openai")]
pub use openai::OpenAIChat;
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
