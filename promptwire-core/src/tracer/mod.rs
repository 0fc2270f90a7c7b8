//! Tracing instrumentation for LLM calls, tool calls and named spans
//!
//! A [`Tracer`] observes work without taking part in it. The core never calls
//! a tracer directly: every call goes through [`Instrumentation`], which
//! swallows tracer errors and panics so that observation can never change the
//! outcome of the traced operation.
//!
//! Tracers keep nesting state, so use one tracer instance per root trace when
//! independent call chains run concurrently.

mod logging;
mod noop;
mod recording;

pub use logging::LoggingTracer;
pub use noop::NoopTracer;
pub use recording::{RecordingTracer, TraceKind, TraceRecord};

use crate::protocol::{Message, Tool};
use crate::providers::llm::Prediction;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Result type for tracer callbacks
pub type TraceResult = Result<(), TraceError>;

/// Failures a tracer may report. They are logged and dropped by [`Instrumentation`].
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("failed to serialize trace payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Description of one LLM call attempt
#[derive(Debug, Clone, Copy)]
pub struct LlmCallTrace<'a> {
    /// Provider name
    pub provider: &'a str,
    /// Model identifier
    pub model: &'a str,
    /// 1-based attempt number within one logical call
    pub current_try: u32,
    /// Messages sent to the model
    pub messages: &'a [Message],
    /// Tools declared for the call
    pub tools: &'a [Tool],
}

/// Observer contract for traced operations
pub trait Tracer: Send + Sync {
    /// Open a top-level trace
    fn start_trace(&self, name: &str, inputs: &Value, tags: &[String]) -> TraceResult;

    /// Close the top-level trace
    fn end_trace(&self, outputs: &Value, error: Option<&str>) -> TraceResult;

    /// Open a nested span
    fn start_span(&self, name: &str, inputs: &Value) -> TraceResult;

    /// Close the innermost open span
    fn end_span(&self, outputs: &Value, error: Option<&str>) -> TraceResult;

    /// Open a span for one LLM call attempt
    fn start_llm_trace(&self, call: &LlmCallTrace<'_>) -> TraceResult;

    /// Close the LLM attempt span
    fn end_llm_trace(&self, completion: Option<&Prediction>, error: Option<&str>) -> TraceResult;

    /// Open a span for one tool invocation
    fn start_tool_trace(&self, tool: &Tool, inputs: &Value) -> TraceResult;

    /// Close the tool span
    fn end_tool_trace(&self, output: Option<&Value>, error: Option<&str>) -> TraceResult;

    /// Zero-duration observation
    fn event(&self, name: &str, inputs: &Value, outputs: &Value, error: Option<&str>)
        -> TraceResult;

    /// Flush any buffered output
    fn finalize(&self) -> TraceResult {
        Ok(())
    }
}

/// Fault-isolating handle the core uses to talk to a [`Tracer`]
#[derive(Clone)]
pub struct Instrumentation {
    tracer: Arc<dyn Tracer>,
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation").finish_non_exhaustive()
    }
}

impl Instrumentation {
    /// Wrap a tracer
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer }
    }

    /// Instrumentation that records nothing
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopTracer))
    }

    /// The wrapped tracer
    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    fn guarded<F>(&self, operation: &'static str, f: F)
    where
        F: FnOnce(&dyn Tracer) -> TraceResult,
    {
        match catch_unwind(AssertUnwindSafe(|| f(self.tracer.as_ref()))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(operation, error = %e, "tracer failed"),
            Err(_) => warn!(operation, "tracer panicked"),
        }
    }

    pub fn start_trace(&self, name: &str, inputs: &Value, tags: &[String]) {
        self.guarded("start_trace", |t| t.start_trace(name, inputs, tags));
    }

    pub fn end_trace(&self, outputs: &Value, error: Option<&str>) {
        self.guarded("end_trace", |t| t.end_trace(outputs, error));
    }

    pub fn start_span(&self, name: &str, inputs: &Value) {
        self.guarded("start_span", |t| t.start_span(name, inputs));
    }

    pub fn end_span(&self, outputs: &Value, error: Option<&str>) {
        self.guarded("end_span", |t| t.end_span(outputs, error));
    }

    pub fn start_llm_trace(&self, call: &LlmCallTrace<'_>) {
        self.guarded("start_llm_trace", |t| t.start_llm_trace(call));
    }

    pub fn end_llm_trace(&self, completion: Option<&Prediction>, error: Option<&str>) {
        self.guarded("end_llm_trace", |t| t.end_llm_trace(completion, error));
    }

    pub fn start_tool_trace(&self, tool: &Tool, inputs: &Value) {
        self.guarded("start_tool_trace", |t| t.start_tool_trace(tool, inputs));
    }

    pub fn end_tool_trace(&self, output: Option<&Value>, error: Option<&str>) {
        self.guarded("end_tool_trace", |t| t.end_tool_trace(output, error));
    }

    pub fn event(&self, name: &str, inputs: &Value, outputs: &Value, error: Option<&str>) {
        self.guarded("event", |t| t.event(name, inputs, outputs, error));
    }

    pub fn finalize(&self) {
        self.guarded("finalize", |t| t.finalize());
    }

    /// Guard that closes the span opened just before it if dropped while armed
    pub(crate) fn close_on_drop<'a>(&'a self, span: OpenSpan<'a>) -> SpanGuard<'a> {
        SpanGuard {
            instrumentation: self,
            span,
            armed: true,
        }
    }

    /// Run `operation` as a top-level trace named `name`
    pub async fn trace<F, T, E>(
        &self,
        name: &str,
        inputs: Value,
        tags: &[String],
        operation: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: Serialize,
        E: fmt::Display,
    {
        self.start_trace(name, &inputs, tags);
        let mut open = self.close_on_drop(OpenSpan::Trace(name));
        let result = operation.await;
        open.disarm();
        match &result {
            Ok(output) => self.end_trace(&to_trace_value(output), None),
            Err(e) => self.end_trace(&Value::Null, Some(&format!("{}: {}", name, e))),
        }
        self.finalize();
        result
    }

    /// Run `operation` as a nested span named `name`
    pub async fn span<F, T, E>(&self, name: &str, inputs: Value, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: Serialize,
        E: fmt::Display,
    {
        self.start_span(name, &inputs);
        let mut open = self.close_on_drop(OpenSpan::Span(name));
        let result = operation.await;
        open.disarm();
        match &result {
            Ok(output) => self.end_span(&to_trace_value(output), None),
            Err(e) => self.end_span(&Value::Null, Some(&format!("{}: {}", name, e))),
        }
        result
    }
}

/// Kind of span a [`SpanGuard`] closes
#[derive(Debug, Clone, Copy)]
pub(crate) enum OpenSpan<'a> {
    Trace(&'a str),
    Span(&'a str),
    LlmCall,
}

/// Closes an open span with a cancellation error when the owning future is
/// dropped before the span is ended normally
#[must_use]
pub(crate) struct SpanGuard<'a> {
    instrumentation: &'a Instrumentation,
    span: OpenSpan<'a>,
    armed: bool,
}

impl SpanGuard<'_> {
    /// The span will be closed by the caller
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let instrumentation = self.instrumentation;
        match self.span {
            OpenSpan::Trace(name) => {
                instrumentation.end_trace(&Value::Null, Some(&format!("{}: cancelled", name)));
                instrumentation.finalize();
            }
            OpenSpan::Span(name) => {
                instrumentation.end_span(&Value::Null, Some(&format!("{}: cancelled", name)))
            }
            OpenSpan::LlmCall => instrumentation.end_llm_trace(None, Some("cancelled")),
        }
    }
}

/// Serialize a value for tracing, falling back to null
pub(crate) fn to_trace_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
