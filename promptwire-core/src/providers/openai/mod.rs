//! OpenAI provider
//!
//! Maps the conversation model onto the Chat Completions API and back.

mod client;
pub mod converter;
pub mod types;

pub use client::OpenAIChat;
pub use types::{OpenAIRequest, OpenAIResponse};
