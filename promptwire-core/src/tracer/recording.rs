//! In-memory tracer for tests and diagnostics

use super::{to_trace_value, LlmCallTrace, TraceResult, Tracer};
use crate::protocol::Tool;
use crate::providers::llm::Prediction;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Mutex;

/// Kind of recorded callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    TraceStart,
    TraceEnd,
    SpanStart,
    SpanEnd,
    LlmStart,
    LlmEnd,
    ToolStart,
    ToolEnd,
    Event,
}

/// One recorded callback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub kind: TraceKind,
    /// Name of the trace, span, tool or event. End records repeat the name of what they close.
    pub name: String,
    /// Open spans at the time of the callback, not counting the one being opened
    pub level: usize,
    pub inputs: Value,
    pub outputs: Value,
    pub error: Option<String>,
    /// Attempt number, for LLM records
    pub current_try: Option<u32>,
}

#[derive(Debug, Default)]
struct State {
    open: Vec<String>,
    records: Vec<TraceRecord>,
}

/// Tracer that keeps every callback in memory
#[derive(Debug, Default)]
pub struct RecordingTracer {
    state: Mutex<State>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far
    pub fn records(&self) -> Vec<TraceRecord> {
        self.lock().records.clone()
    }

    /// Records of one kind
    pub fn records_of(&self, kind: TraceKind) -> Vec<TraceRecord> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of currently open spans
    pub fn level(&self) -> usize {
        self.lock().open.len()
    }

    /// Attempt numbers of every recorded LLM call
    pub fn llm_attempts(&self) -> Vec<u32> {
        self.records_of(TraceKind::LlmStart)
            .into_iter()
            .filter_map(|r| r.current_try)
            .collect()
    }

    /// Error messages recorded by any callback
    pub fn errors(&self) -> Vec<String> {
        self.lock()
            .records
            .iter()
            .filter_map(|r| r.error.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned recorder still holds valid records
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open(&self, kind: TraceKind, name: &str, inputs: Value, current_try: Option<u32>) {
        let mut state = self.lock();
        let level = state.open.len();
        state.records.push(TraceRecord {
            kind,
            name: name.to_string(),
            level,
            inputs,
            outputs: Value::Null,
            error: None,
            current_try,
        });
        state.open.push(name.to_string());
    }

    fn close(&self, kind: TraceKind, outputs: Value, error: Option<&str>) {
        let mut state = self.lock();
        let name = state.open.pop().unwrap_or_default();
        let level = state.open.len();
        state.records.push(TraceRecord {
            kind,
            name,
            level,
            inputs: Value::Null,
            outputs,
            error: error.map(str::to_string),
            current_try: None,
        });
    }

    fn point(&self, kind: TraceKind, name: &str, inputs: Value, outputs: Value, error: Option<&str>) {
        let mut state = self.lock();
        let level = state.open.len();
        state.records.push(TraceRecord {
            kind,
            name: name.to_string(),
            level,
            inputs,
            outputs,
            error: error.map(str::to_string),
            current_try: None,
        });
    }
}

impl Tracer for RecordingTracer {
    fn start_trace(&self, name: &str, inputs: &Value, tags: &[String]) -> TraceResult {
        self.point(
            TraceKind::TraceStart,
            name,
            json!({"inputs": inputs, "tags": tags}),
            Value::Null,
            None,
        );
        Ok(())
    }

    fn end_trace(&self, outputs: &Value, error: Option<&str>) -> TraceResult {
        self.point(TraceKind::TraceEnd, "", Value::Null, outputs.clone(), error);
        Ok(())
    }

    fn start_span(&self, name: &str, inputs: &Value) -> TraceResult {
        self.open(TraceKind::SpanStart, name, inputs.clone(), None);
        Ok(())
    }

    fn end_span(&self, outputs: &Value, error: Option<&str>) -> TraceResult {
        self.close(TraceKind::SpanEnd, outputs.clone(), error);
        Ok(())
    }

    fn start_llm_trace(&self, call: &LlmCallTrace<'_>) -> TraceResult {
        let inputs = json!({
            "provider": call.provider,
            "messages": to_trace_value(&call.messages),
            "tools": call.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        });
        self.open(TraceKind::LlmStart, call.model, inputs, Some(call.current_try));
        Ok(())
    }

    fn end_llm_trace(&self, completion: Option<&Prediction>, error: Option<&str>) -> TraceResult {
        let outputs = completion.map(Prediction::content_value).unwrap_or(Value::Null);
        self.close(TraceKind::LlmEnd, outputs, error);
        Ok(())
    }

    fn start_tool_trace(&self, tool: &Tool, inputs: &Value) -> TraceResult {
        self.open(TraceKind::ToolStart, &tool.name, inputs.clone(), None);
        Ok(())
    }

    fn end_tool_trace(&self, output: Option<&Value>, error: Option<&str>) -> TraceResult {
        self.close(TraceKind::ToolEnd, output.cloned().unwrap_or(Value::Null), error);
        Ok(())
    }

    fn event(
        &self,
        name: &str,
        inputs: &Value,
        outputs: &Value,
        error: Option<&str>,
    ) -> TraceResult {
        self.point(TraceKind::Event, name, inputs.clone(), outputs.clone(), error);
        Ok(())
    }
}
