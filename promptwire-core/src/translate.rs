//! Translation of key/value records through an LLM
//!
//! The model is given one forced tool, `store_translation`, whose schema has a
//! string property per input key. Its arguments are the translated record.

use crate::error::LlmResult;
use crate::protocol::{ChatMessage, Message, Tool};
use crate::providers::llm::{Llm, Prediction};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Name of the tool the model stores its translation with
pub const STORE_TRANSLATION_TOOL: &str = "store_translation";

/// Argument schema of the translation tool: one string property per key
pub fn translation_output_schema(input: &BTreeMap<String, String>, target_language: &str) -> Value {
    let properties: Map<String, Value> = input
        .keys()
        .map(|key| {
            (
                key.clone(),
                json!({
                    "type": "string",
                    "description": format!("Value of `{}` translated into {}", key, target_language),
                }),
            )
        })
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": input.keys().collect::<Vec<_>>(),
    })
}

fn translation_prompt(input: &BTreeMap<String, String>, target_language: &str) -> Vec<Message> {
    let record = serde_json::to_string_pretty(input).unwrap_or_default();
    vec![
        ChatMessage::system(format!(
            "You are a professional translator. Translate every value of the given record \
             into {target_language}. Keep the keys unchanged, keep the meaning and tone, and \
             store the finished translation using the provided tool."
        ))
        .into(),
        ChatMessage::user(record).into(),
    ]
}

/// Translate every value of `input` into `target_language`.
///
/// Returns the translated record, or an empty map if the model answered in
/// text instead of calling the translation tool.
pub async fn translate_llm(
    llm: &Llm,
    input: &BTreeMap<String, String>,
    target_language: &str,
) -> LlmResult<Map<String, Value>> {
    let inputs = json!({"input": input, "target_language": target_language});
    llm.instrumentation()
        .trace(
            "translate",
            inputs,
            &["llm".to_string()],
            run_translation(llm, input, target_language),
        )
        .await
}

async fn run_translation(
    llm: &Llm,
    input: &BTreeMap<String, String>,
    target_language: &str,
) -> LlmResult<Map<String, Value>> {
    let tool = Tool::from_callable(
        STORE_TRANSLATION_TOOL,
        format!("Stores the finished translation into {}.", target_language),
        translation_output_schema(input, target_language),
        |args| Ok(args),
    );

    let messages = translation_prompt(input, target_language);
    let prediction = llm.predict(&messages, None, &[tool]).await?;

    let Prediction::ToolCalls(message) = prediction else {
        debug!("model replied without calling the translation tool");
        return Ok(Map::new());
    };
    let Some(call) = message.first() else {
        return Ok(Map::new());
    };

    match call.invoke_traced(llm.instrumentation())? {
        Value::Object(translation) => Ok(translation),
        other => {
            warn!(result = %other, "translation tool returned a non-object");
            Ok(Map::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_property_per_key() {
        let input = BTreeMap::from([
            ("greeting".to_string(), "Hallo".to_string()),
            ("farewell".to_string(), "Tschüss".to_string()),
        ]);
        let schema = translation_output_schema(&input, "English");

        assert_eq!(schema["properties"]["greeting"]["type"], "string");
        assert_eq!(schema["required"], json!(["farewell", "greeting"]));
    }

    #[test]
    fn test_prompt_contains_record_and_language() {
        let input = BTreeMap::from([("k".to_string(), "Wert".to_string())]);
        let text = crate::protocol::messages_to_text(&translation_prompt(&input, "French"));
        assert!(text.contains("French"));
        assert!(text.contains("Wert"));
    }
}
