//! Promptwire Core Library
//!
//! Provider-agnostic chat completions with tool calling, structured output,
//! retrying and pluggable tracing.
//!
//! ```no_run
//! use promptwire_core::{ChatMessage, Llm, OpenAIChat};
//! use serde_json::json;
//!
//! # async fn run() -> promptwire_core::LlmResult<()> {
//! let llm = Llm::new(OpenAIChat::from_env("gpt-4o-mini")?);
//! let schema = json!({"answer": {"type": "string"}});
//! let prediction = llm
//!     .predict(&[ChatMessage::user("What is 2 + 2?").into()], Some(&schema), &[])
//!     .await?;
//! println!("{:?}", prediction.structured());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod testing;
pub mod tracer;
pub mod translate;

pub use config::{HttpConfig, LlmConfig, OpenAIConfig, ProviderType};
pub use error::{LlmError, LlmResult};
pub use protocol::{
    ChatMessage, ContentPart, Message, MessageContent, MessageRole, SingleToolCallMessage, Tool,
    ToolCallsMessage,
};
#[cfg(feature = "openai")]
pub use providers::OpenAIChat;
pub use providers::{create_llm, ChatModel, Llm, Prediction, ProviderError, RetryPolicy};
pub use tracer::{Instrumentation, LoggingTracer, NoopTracer, RecordingTracer, Tracer};

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
