//! LLM abstraction
//!
//! [`ChatModel`] is the contract every provider adapter implements: a single
//! completion call plus static capability descriptors. [`Llm`] wraps a model
//! with the retry loop, the structured-output synthesis and the mapping of raw
//! completions into [`Prediction`]s.

use crate::error::{LlmError, LlmResult};
use crate::protocol::{
    ChatMessage, Message, MessageRole, SingleToolCallMessage, Tool, ToolCallsMessage,
};
use crate::providers::error::ProviderResult;
use crate::providers::retry::{RetryError, RetryExecutor, RetryPolicy};
use crate::tracer::{Instrumentation, LlmCallTrace, OpenSpan, Tracer};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Tool invocation as returned on the wire, before resolution
#[derive(Debug, Clone, PartialEq)]
pub struct RawToolCall {
    /// Provider-assigned correlation identifier
    pub id: String,
    /// Invoked tool name
    pub name: String,
    /// Serialized arguments
    pub arguments: String,
}

/// Provider completion, mapped out of the wire format
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub role: MessageRole,
    pub content: Option<String>,
    pub tool_calls: Vec<RawToolCall>,
}

impl ModelResponse {
    /// Plain assistant text
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant turn invoking tools
    pub fn tool_calls(tool_calls: Vec<RawToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls,
        }
    }
}

/// Contract implemented by provider adapters
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name, e.g. `"openai"`
    fn name(&self) -> &str;

    /// Model identifier sent to the provider
    fn model(&self) -> &str;

    /// Whether images can be sent to the model directly
    fn supports_images(&self) -> bool;

    /// Whether audio can be sent to the model directly
    fn supports_audio(&self) -> bool;

    /// Retry budget and the error kinds this provider treats as transient
    fn retry_policy(&self) -> RetryPolicy;

    /// Perform one completion call. `tools` is already final: when structured
    /// output was requested it holds only the capture tool.
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> ProviderResult<ModelResponse>;
}

/// Result of [`Llm::predict`]
#[derive(Debug, Clone)]
pub enum Prediction {
    /// The model answered in text
    Message(ChatMessage),
    /// Structured output was requested; `None` means the model produced no valid result
    Structured(Option<Value>),
    /// The model asked for tool invocations
    ToolCalls(ToolCallsMessage),
}

impl Prediction {
    /// Text of a plain answer
    pub fn text(&self) -> Option<String> {
        match self {
            Prediction::Message(m) => Some(m.text()),
            Prediction::ToolCalls(m) => m.content.clone(),
            Prediction::Structured(_) => None,
        }
    }

    /// Structured result, if one was produced
    pub fn structured(&self) -> Option<&Value> {
        match self {
            Prediction::Structured(value) => value.as_ref(),
            _ => None,
        }
    }

    /// Requested tool calls
    pub fn tool_calls(&self) -> Option<&ToolCallsMessage> {
        match self {
            Prediction::ToolCalls(m) => Some(m),
            _ => None,
        }
    }

    /// Content as JSON: text, the structured value, or null
    pub fn content_value(&self) -> Value {
        match self {
            Prediction::Message(m) => Value::String(m.text()),
            Prediction::Structured(value) => value.clone().unwrap_or(Value::Null),
            Prediction::ToolCalls(m) => m.content.clone().map(Value::String).unwrap_or(Value::Null),
        }
    }

    /// Turn the prediction into a conversation message
    pub fn into_message(self) -> Message {
        match self {
            Prediction::Message(m) => m.into(),
            Prediction::ToolCalls(m) => m.into(),
            Prediction::Structured(value) => {
                ChatMessage::assistant(value.unwrap_or(Value::Null).to_string()).into()
            }
        }
    }
}

/// A chat model together with its retry loop and tracer
#[derive(Clone)]
pub struct Llm {
    model: Arc<dyn ChatModel>,
    executor: RetryExecutor,
    instrumentation: Instrumentation,
}

impl fmt::Debug for Llm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Llm")
            .field("provider", &self.model.name())
            .field("model", &self.model.model())
            .field("retry_policy", self.executor.policy())
            .finish()
    }
}

impl Llm {
    /// Wrap a model, using the retry policy it declares
    pub fn new<M: ChatModel + 'static>(model: M) -> Self {
        Self::from_arc(Arc::new(model))
    }

    /// Wrap a shared model
    pub fn from_arc(model: Arc<dyn ChatModel>) -> Self {
        let executor = RetryExecutor::new(model.retry_policy());
        Self {
            model,
            executor,
            instrumentation: Instrumentation::noop(),
        }
    }

    /// Use `tracer` for subsequent calls
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.instrumentation = Instrumentation::new(tracer);
        self
    }

    /// Use `instrumentation` for subsequent calls
    pub fn with_instrumentation(mut self, instrumentation: Instrumentation) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    /// Override the model's declared retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.executor = RetryExecutor::new(policy);
        self
    }

    pub fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.executor.policy()
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn model(&self) -> &str {
        self.model.model()
    }

    pub fn supports_images(&self) -> bool {
        self.model.supports_images()
    }

    pub fn supports_audio(&self) -> bool {
        self.model.supports_audio()
    }

    /// Run a completion over `messages`.
    ///
    /// With `output_schema`, a single capture tool is declared in place of
    /// `tools` and the model's arguments to it are returned as
    /// [`Prediction::Structured`].
    pub async fn predict(
        &self,
        messages: &[Message],
        output_schema: Option<&Value>,
        tools: &[Tool],
    ) -> LlmResult<Prediction> {
        self.predict_with_cancel(messages, output_schema, tools, &CancellationToken::new())
            .await
    }

    /// [`predict`](Self::predict) that stops retrying once `cancel` fires
    pub async fn predict_with_cancel(
        &self,
        messages: &[Message],
        output_schema: Option<&Value>,
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> LlmResult<Prediction> {
        if messages.is_empty() {
            return Err(LlmError::InvalidInput(
                "at least one message is required".to_string(),
            ));
        }

        let capture;
        let tools: &[Tool] = match output_schema {
            Some(schema) => {
                if !tools.is_empty() {
                    debug!(
                        ignored = tools.len(),
                        "structured output requested, ignoring declared tools"
                    );
                }
                capture = [Tool::store_result(schema)];
                &capture
            }
            None => tools,
        };
        let structured = output_schema.is_some();

        let model = self.model.as_ref();
        let instrumentation = &self.instrumentation;

        let outcome = self
            .executor
            .execute_with_cancel(cancel, |current_try| async move {
                instrumentation.start_llm_trace(&LlmCallTrace {
                    provider: model.name(),
                    model: model.model(),
                    current_try,
                    messages,
                    tools,
                });
                let mut open = instrumentation.close_on_drop(OpenSpan::LlmCall);
                let response = model.complete(messages, tools).await;
                open.disarm();
                match response {
                    Ok(response) => {
                        let prediction = map_response(response, structured, tools);
                        instrumentation.end_llm_trace(Some(&prediction), None);
                        Ok(prediction)
                    }
                    Err(e) => {
                        instrumentation.end_llm_trace(None, Some(&e.to_string()));
                        Err(e)
                    }
                }
            })
            .await;

        outcome.map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => LlmError::ProviderUnavailable {
                attempts,
                source: last,
            },
            RetryError::Fatal { error, .. } => LlmError::Provider(error),
            RetryError::Cancelled { attempts, .. } => LlmError::Cancelled { attempts },
        })
    }
}

/// Map a raw completion onto the three result shapes
fn map_response(response: ModelResponse, structured: bool, tools: &[Tool]) -> Prediction {
    if response.tool_calls.is_empty() {
        return Prediction::Message(ChatMessage::new(
            response.role,
            response.content.unwrap_or_default(),
        ));
    }

    if structured {
        let value = match serde_json::from_str::<Value>(&response.tool_calls[0].arguments) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "structured output arguments are not valid JSON");
                None
            }
        };
        return Prediction::Structured(value);
    }

    let calls = response
        .tool_calls
        .into_iter()
        .map(|c| SingleToolCallMessage::new(c.id, c.name, c.arguments))
        .collect();
    let mut message = ToolCallsMessage::new(response.content, calls);
    let unresolved = message.resolve_tools(tools);
    if !unresolved.is_empty() {
        warn!(?unresolved, "model requested tools that were not declared");
    }
    Prediction::ToolCalls(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str, arguments: &str) -> RawToolCall {
        RawToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_map_plain_text() {
        let prediction = map_response(ModelResponse::text("hi"), true, &[]);
        assert_eq!(prediction.text().as_deref(), Some("hi"));
    }

    #[test]
    fn test_map_structured_uses_first_call() {
        let response = ModelResponse::tool_calls(vec![
            call("1", "store_result", r#"{"a": 1}"#),
            call("2", "store_result", r#"{"a": 2}"#),
        ]);
        let prediction = map_response(response, true, &[]);
        assert_eq!(prediction.structured(), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_map_structured_invalid_json_is_null() {
        let response = ModelResponse::tool_calls(vec![call("1", "store_result", "{oops")]);
        let prediction = map_response(response, true, &[]);
        assert!(matches!(prediction, Prediction::Structured(None)));
        assert_eq!(prediction.content_value(), Value::Null);
    }

    #[test]
    fn test_map_tool_calls_resolves_by_name() {
        let tools = vec![Tool::new("weather", "w", json!({}))];
        let response = ModelResponse::tool_calls(vec![
            call("1", "weather", "{}"),
            call("2", "unknown", "{}"),
        ]);
        let prediction = map_response(response, false, &tools);
        let message = prediction.tool_calls().unwrap();
        assert_eq!(message.name, "weather, unknown");
        assert!(message.tool_calls[0].tool.is_some());
        assert!(message.tool_calls[1].tool.is_none());
    }
}
