//! Protocol module for LLM conversation structures
//!
//! This module defines the provider-agnostic message and tool model:
//! - Conversation turns ([`ChatMessage`], [`ToolCallsMessage`])
//! - Tool declarations ([`Tool`]) and tool invocations ([`SingleToolCallMessage`])

pub mod tool;
pub mod types;

pub use tool::{SingleToolCallMessage, Tool, ToolCallsMessage, ToolFn, STORE_RESULT_TOOL};
pub use types::{messages_to_text, ChatMessage, ContentPart, Message, MessageContent, MessageRole};
