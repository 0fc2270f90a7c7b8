use super::{LlmCallTrace, TraceResult, Tracer};
use crate::protocol::Tool;
use crate::providers::llm::Prediction;
use serde_json::Value;

/// Tracer that ignores every callback
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_trace(&self, _name: &str, _inputs: &Value, _tags: &[String]) -> TraceResult {
        Ok(())
    }

    fn end_trace(&self, _outputs: &Value, _error: Option<&str>) -> TraceResult {
        Ok(())
    }

    fn start_span(&self, _name: &str, _inputs: &Value) -> TraceResult {
        Ok(())
    }

    fn end_span(&self, _outputs: &Value, _error: Option<&str>) -> TraceResult {
        Ok(())
    }

    fn start_llm_trace(&self, _call: &LlmCallTrace<'_>) -> TraceResult {
        Ok(())
    }

    fn end_llm_trace(&self, _completion: Option<&Prediction>, _error: Option<&str>) -> TraceResult {
        Ok(())
    }

    fn start_tool_trace(&self, _tool: &Tool, _inputs: &Value) -> TraceResult {
        Ok(())
    }

    fn end_tool_trace(&self, _output: Option<&Value>, _error: Option<&str>) -> TraceResult {
        Ok(())
    }

    fn event(
        &self,
        _name: &str,
        _inputs: &Value,
        _outputs: &Value,
        _error: Option<&str>,
    ) -> TraceResult {
        Ok(())
    }
}
