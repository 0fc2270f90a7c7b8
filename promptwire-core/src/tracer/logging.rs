//! Tracer that renders trace events as indented log lines

use super::{to_trace_value, LlmCallTrace, TraceResult, Tracer};
use crate::protocol::Tool;
use crate::providers::llm::Prediction;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info};

/// Emits one `tracing` event per trace callback, indented by span depth
#[derive(Debug, Default)]
pub struct LoggingTracer {
    level: AtomicUsize,
}

impl LoggingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently open spans
    pub fn level(&self) -> usize {
        self.level.load(Ordering::SeqCst)
    }

    fn indent(&self) -> String {
        indent_for(self.level())
    }

    fn push(&self) {
        self.level.fetch_add(1, Ordering::SeqCst);
    }

    fn pop(&self) {
        let _ = self
            .level
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |l| l.checked_sub(1));
    }
}

/// `|--` at the top level, `|` plus two spaces per level and `|--` below it
pub fn indent_for(level: usize) -> String {
    if level == 0 {
        "|--".to_string()
    } else {
        format!("|{}|--", "  ".repeat(level))
    }
}

fn tool_declaration(tool: &Tool) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.parameters_schema(),
    })
}

impl Tracer for LoggingTracer {
    fn start_trace(&self, name: &str, inputs: &Value, tags: &[String]) -> TraceResult {
        if tags.is_empty() {
            info!(target: "promptwire::trace", "[TRACE START] {}, inputs={}", name, inputs);
        } else {
            info!(target: "promptwire::trace", "[TRACE START] {}, {:?}, inputs={}", name, tags, inputs);
        }
        Ok(())
    }

    fn end_trace(&self, outputs: &Value, error: Option<&str>) -> TraceResult {
        match error {
            Some(msg) => error!(target: "promptwire::trace", "[TRACE ERROR] {}", msg),
            None => info!(target: "promptwire::trace", "[TRACE END] outputs={}", outputs),
        }
        Ok(())
    }

    fn start_span(&self, name: &str, inputs: &Value) -> TraceResult {
        info!(target: "promptwire::trace", "{}[SPAN START] {}, inputs={}", self.indent(), name, inputs);
        self.push();
        Ok(())
    }

    fn end_span(&self, outputs: &Value, error: Option<&str>) -> TraceResult {
        self.pop();
        match error {
            Some(msg) => error!(target: "promptwire::trace", "{}[SPAN ERROR] {}", self.indent(), msg),
            None => info!(target: "promptwire::trace", "{}[SPAN END] outputs={}", self.indent(), outputs),
        }
        Ok(())
    }

    fn start_llm_trace(&self, call: &LlmCallTrace<'_>) -> TraceResult {
        let messages = to_trace_value(&call.messages);
        let tools = Value::Array(call.tools.iter().map(tool_declaration).collect());
        info!(
            target: "promptwire::trace",
            "{}[LLM <] {}/{}, current_try: {}, tools={}, messages={}",
            self.indent(),
            call.provider,
            call.model,
            call.current_try,
            tools,
            messages
        );
        self.push();
        Ok(())
    }

    fn end_llm_trace(&self, completion: Option<&Prediction>, error: Option<&str>) -> TraceResult {
        self.pop();
        if let Some(msg) = error {
            error!(target: "promptwire::trace", "{}[LLM COMPLETION ERROR] {}", self.indent(), msg);
            return Ok(());
        }
        let Some(completion) = completion else {
            return Ok(());
        };
        let tool_calls: Vec<Value> = match completion {
            Prediction::ToolCalls(message) => message
                .tool_calls
                .iter()
                .map(|c| json!({"function": {"name": c.name, "arguments": c.payload_dict()}}))
                .collect(),
            _ => Vec::new(),
        };
        let tool_calls = Value::Array(tool_calls);
        let content = completion.content_value();
        info!(
            target: "promptwire::trace",
            "{}[LLM >] {}, tool_calls: {}",
            self.indent(),
            content,
            tool_calls
        );
        Ok(())
    }

    fn start_tool_trace(&self, tool: &Tool, inputs: &Value) -> TraceResult {
        info!(target: "promptwire::trace", "{}[TOOL] {}({})", self.indent(), tool.name, inputs);
        self.push();
        Ok(())
    }

    fn end_tool_trace(&self, output: Option<&Value>, error: Option<&str>) -> TraceResult {
        self.pop();
        let null = Value::Null;
        let output = output.unwrap_or(&null);
        match error {
            Some(msg) => error!(target: "promptwire::trace", "{}[TOOL ERROR] {}", self.indent(), msg),
            None => info!(target: "promptwire::trace", "{}[TOOL RESULT] {}", self.indent(), output),
        }
        Ok(())
    }

    fn event(
        &self,
        name: &str,
        inputs: &Value,
        outputs: &Value,
        error: Option<&str>,
    ) -> TraceResult {
        match error {
            Some(msg) => error!(target: "promptwire::trace", "{}[EVENT] {}", self.indent(), msg),
            None => info!(
                target: "promptwire::trace",
                "{}[EVENT] {}, inputs={}, outputs={}",
                self.indent(),
                name,
                inputs,
                outputs
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        assert_eq!(indent_for(0), "|--");
        assert_eq!(indent_for(1), "|  |--");
        assert_eq!(indent_for(2), "|    |--");
    }

    #[test]
    fn test_level_tracks_open_spans() {
        let tracer = LoggingTracer::new();
        tracer.start_span("a", &Value::Null).unwrap();
        tracer.start_span("b", &Value::Null).unwrap();
        assert_eq!(tracer.level(), 2);
        tracer.end_span(&Value::Null, None).unwrap();
        tracer.end_span(&Value::Null, Some("failed")).unwrap();
        assert_eq!(tracer.level(), 0);

        // Unbalanced end does not underflow
        tracer.end_span(&Value::Null, None).unwrap();
        assert_eq!(tracer.level(), 0);
    }
}
