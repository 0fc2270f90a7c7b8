//! Scripted chat model for tests
//!
//! [`FakeChatModel`] replays queued responses or errors in order and records
//! every request it receives, so tests can assert on what an orchestration
//! sent to the model without any network access.

use crate::protocol::{messages_to_text, Message, Tool, STORE_RESULT_TOOL};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::llm::{ChatModel, ModelResponse, RawToolCall};
use crate::providers::retry::RetryPolicy;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One call observed by [`FakeChatModel`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    /// Names of the declared tools, in order
    pub tools: Vec<String>,
    /// Output schema, when the request declared only the capture tool
    pub output_schema: Option<Value>,
}

#[derive(Debug, Default)]
struct FakeState {
    script: VecDeque<ProviderResult<ModelResponse>>,
    requests: Vec<RecordedRequest>,
}

/// Chat model that answers from a script
#[derive(Debug)]
pub struct FakeChatModel {
    name: String,
    model: String,
    supports_images: bool,
    supports_audio: bool,
    retry_policy: RetryPolicy,
    state: Mutex<FakeState>,
}

impl Default for FakeChatModel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChatModel {
    /// Empty script, millisecond backoff and the default retry budget
    pub fn new() -> Self {
        Self {
            name: "test-llm".to_string(),
            model: "test-model".to_string(),
            supports_images: false,
            supports_audio: false,
            retry_policy: RetryPolicy::default().with_delays(1, 5).with_jitter(0.0),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Script a sequence of successful responses
    pub fn with_responses(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        let model = Self::new();
        for response in responses {
            model.push_response(response);
        }
        model
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capabilities(mut self, images: bool, audio: bool) -> Self {
        self.supports_images = images;
        self.supports_audio = audio;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Queue a successful response
    pub fn push_response(&self, response: ModelResponse) {
        self.lock().script.push_back(Ok(response));
    }

    /// Queue a failure
    pub fn push_error(&self, error: ProviderError) {
        self.lock().script.push_back(Err(error));
    }

    /// Queue a reply invoking a single tool
    pub fn push_tool_call(&self, name: &str, arguments: Value) {
        self.push_response(tool_response(name, arguments));
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of completion calls made
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// Scripted entries not yet consumed
    pub fn remaining(&self) -> usize {
        self.lock().script.len()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.lock().requests.last().cloned()
    }

    /// Panics unless the text of the last request contains `text`
    pub fn assert_last_request_contains(&self, text: &str) {
        let last = self.last_request().expect("no request was made");
        let rendered = messages_to_text(&last.messages);
        assert!(
            rendered.contains(text),
            "last request does not contain {text:?}:\n{rendered}"
        );
    }

    /// Panics if the text of the last request contains `text`
    pub fn assert_last_request_not_contains(&self, text: &str) {
        let last = self.last_request().expect("no request was made");
        let rendered = messages_to_text(&last.messages);
        assert!(
            !rendered.contains(text),
            "last request unexpectedly contains {text:?}:\n{rendered}"
        );
    }

    /// Panics unless the last request declared `tool_name`; with `fixed`, it
    /// must have been the only tool
    pub fn assert_last_request_defined_tool(&self, tool_name: &str, fixed: bool) {
        let last = self.last_request().expect("no request was made");
        assert!(
            last.tools.iter().any(|t| t == tool_name),
            "tool {tool_name:?} not declared, got {:?}",
            last.tools
        );
        if fixed {
            assert_eq!(last.tools, vec![tool_name.to_string()], "tool choice is not fixed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Reply invoking one tool with `arguments`
pub fn tool_response(name: &str, arguments: Value) -> ModelResponse {
    ModelResponse::tool_calls(vec![RawToolCall {
        id: "fake".to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }])
}

#[async_trait]
impl ChatModel for FakeChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_images(&self) -> bool {
        self.supports_images
    }

    fn supports_audio(&self) -> bool {
        self.supports_audio
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy.clone()
    }

    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> ProviderResult<ModelResponse> {
        let output_schema = match tools {
            [only] if only.name == STORE_RESULT_TOOL => Some(only.args_schema.clone()),
            _ => None,
        };

        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            output_schema,
        });

        state.script.pop_front().unwrap_or_else(|| {
            Err(ProviderError::Custom {
                code: "SCRIPT_EXHAUSTED".to_string(),
                message: "no scripted response left".to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChatMessage;
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_script_in_order() {
        let model = FakeChatModel::with_responses([ModelResponse::text("one")]);
        model.push_error(ProviderError::Timeout);

        let messages = vec![Message::from(ChatMessage::user("hello"))];
        let first = model.complete(&messages, &[]).await.unwrap();
        assert_eq!(first.content.as_deref(), Some("one"));
        assert_eq!(model.complete(&messages, &[]).await, Err(ProviderError::Timeout));
        assert!(matches!(
            model.complete(&messages, &[]).await,
            Err(ProviderError::Custom { .. })
        ));
        assert_eq!(model.calls(), 3);
        model.assert_last_request_contains("hello");
        model.assert_last_request_not_contains("goodbye");
    }

    #[tokio::test]
    async fn test_records_capture_schema() {
        let model = FakeChatModel::new();
        let schema = json!({"type": "object", "properties": {}});
        let _ = model
            .complete(
                &[ChatMessage::user("x").into()],
                &[Tool::store_result(&schema)],
            )
            .await;

        let last = model.last_request().unwrap();
        assert_eq!(last.output_schema, Some(schema));
        model.assert_last_request_defined_tool(STORE_RESULT_TOOL, true);
    }
}
