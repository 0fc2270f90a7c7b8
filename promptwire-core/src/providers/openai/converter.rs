//! Conversion between the conversation model and the OpenAI wire format

use super::types::*;
use crate::config::OpenAIConfig;
use crate::protocol::{
    ChatMessage, ContentPart, Message, MessageContent, MessageRole, Tool, ToolCallsMessage,
};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::llm::{ModelResponse, RawToolCall};
use serde_json::{json, Value};
use tracing::debug;

/// Build the request body for one completion call.
///
/// `tools` and `tool_choice` are omitted entirely when no tools are declared.
pub fn build_request(config: &OpenAIConfig, messages: &[Message], tools: &[Tool]) -> OpenAIRequest {
    let (declared, choice) = if tools.is_empty() {
        (None, None)
    } else {
        (
            Some(tools.iter().map(to_openai_tool).collect()),
            Some(tool_choice(tools)),
        )
    };

    OpenAIRequest {
        model: config.llm.model.clone(),
        messages: to_openai_messages(messages),
        temperature: config.llm.temperature,
        seed: config.llm.seed,
        tools: declared,
        tool_choice: choice,
    }
}

/// Tool-choice policy: a single tool is forced, several are left to the model
pub fn tool_choice(tools: &[Tool]) -> Value {
    match tools {
        [] => json!("none"),
        [only] => json!({"type": "function", "function": {"name": only.name}}),
        _ => json!("auto"),
    }
}

pub fn to_openai_tool(tool: &Tool) -> OpenAITool {
    OpenAITool {
        tool_type: function_type(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: Some(tool.description.clone()).filter(|d| !d.is_empty()),
            parameters: tool.parameters_schema(),
        },
    }
}

pub fn to_openai_messages(messages: &[Message]) -> Vec<OpenAIMessage> {
    messages
        .iter()
        .map(|m| match m {
            Message::Chat(chat) => to_openai_chat_message(chat),
            Message::ToolCalls(calls) => to_openai_tool_calls_message(calls),
        })
        .collect()
}

fn to_openai_chat_message(message: &ChatMessage) -> OpenAIMessage {
    OpenAIMessage {
        role: message.role.as_str().to_string(),
        content: Some(to_openai_content(&message.content)),
        name: message.name.clone(),
        tool_calls: None,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn to_openai_tool_calls_message(message: &ToolCallsMessage) -> OpenAIMessage {
    OpenAIMessage {
        role: MessageRole::Assistant.as_str().to_string(),
        content: message.content.clone().map(OpenAIContent::Text),
        name: None,
        tool_calls: Some(
            message
                .tool_calls
                .iter()
                .map(|c| OpenAIToolCall {
                    id: c.id.clone(),
                    tool_type: function_type(),
                    function: OpenAIFunctionCall {
                        name: c.name.clone(),
                        arguments: c.payload.clone(),
                    },
                })
                .collect(),
        ),
        tool_call_id: None,
    }
}

fn to_openai_content(content: &MessageContent) -> OpenAIContent {
    match content {
        MessageContent::Text(text) => OpenAIContent::Text(text.clone()),
        MessageContent::Parts(parts) => OpenAIContent::Parts(
            parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(OpenAIContentPart::Text { text: text.clone() }),
                    ContentPart::Image {
                        url,
                        base64,
                        media_type,
                    } => {
                        let url = match (url, base64) {
                            (Some(url), _) => url.clone(),
                            (None, Some(data)) => format!(
                                "data:{};base64,{}",
                                media_type.as_deref().unwrap_or("image/jpeg"),
                                data
                            ),
                            (None, None) => return None,
                        };
                        Some(OpenAIContentPart::ImageUrl {
                            image_url: OpenAIImageUrl { url, detail: None },
                        })
                    }
                    ContentPart::Audio { .. } => {
                        debug!("dropping audio part, not supported by chat completions");
                        None
                    }
                })
                .collect(),
        ),
    }
}

/// Map a completion onto the provider-neutral response, using the first choice
pub fn from_openai_response(response: OpenAIResponse) -> ProviderResult<ModelResponse> {
    if let Some(usage) = &response.usage {
        debug!(
            id = %response.id,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "completion usage"
        );
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))?;

    let message = choice.message;
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| RawToolCall {
            id: c.id,
            name: c.function.name,
            arguments: c.function.arguments,
        })
        .collect();

    Ok(ModelResponse {
        role: MessageRole::from_wire(&message.role),
        content: message.content.map(OpenAIContent::into_text),
        tool_calls,
    })
}
