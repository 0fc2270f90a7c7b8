//! Tool definitions and tool-call messages
//!
//! A [`Tool`] describes a capability the model may invoke. When the model
//! decides to invoke tools, the response is mapped into a
//! [`ToolCallsMessage`] whose entries are resolved by name against the tools
//! the caller declared for that request.

use crate::error::{LlmError, LlmResult};
use crate::tracer::Instrumentation;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Name of the synthesized tool used to capture structured output
pub const STORE_RESULT_TOOL: &str = "store_result";

/// Executable bound to a tool. Receives the parsed arguments.
pub type ToolFn = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// A callable capability description
#[derive(Clone)]
pub struct Tool {
    /// Tool identifier, unique within one request
    pub name: String,

    /// Natural-language description shown to the model
    pub description: String,

    /// JSON schema describing the expected arguments
    pub args_schema: Value,

    callable: Option<ToolFn>,
}

impl Tool {
    /// Create a tool without an executable. Invoking it returns its arguments unchanged.
    pub fn new(name: impl Into<String>, description: impl Into<String>, args_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args_schema,
            callable: None,
        }
    }

    /// Create a tool bound to `callable`
    pub fn from_callable<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        args_schema: Value,
        callable: F,
    ) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, description, args_schema).with_callable(callable)
    }

    /// Bind an executable to this tool
    pub fn with_callable<F>(mut self, callable: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.callable = Some(Arc::new(callable));
        self
    }

    /// The capture tool synthesized for structured output requests
    pub fn store_result(output_schema: &Value) -> Self {
        Self::new(STORE_RESULT_TOOL, "Stores your result", output_schema.clone())
    }

    /// Whether an executable is bound
    pub fn has_callable(&self) -> bool {
        self.callable.is_some()
    }

    /// Argument schema as a JSON-schema object.
    ///
    /// A schema without a top-level `type` is read as a map of property
    /// schemas, all of them required.
    pub fn parameters_schema(&self) -> Value {
        match &self.args_schema {
            Value::Object(map) if map.contains_key("type") => self.args_schema.clone(),
            Value::Object(properties) => json!({
                "type": "object",
                "properties": properties,
                "required": properties.keys().collect::<Vec<_>>(),
            }),
            _ => json!({ "type": "object", "properties": {} }),
        }
    }

    /// Run the bound executable, or echo the arguments if none is bound
    pub fn call(&self, args: Value) -> LlmResult<Value> {
        match &self.callable {
            Some(callable) => callable(args).map_err(|e| LlmError::ToolExecution {
                tool: self.name.clone(),
                message: e.to_string(),
            }),
            None => Ok(args),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("args_schema", &self.args_schema)
            .field("has_callable", &self.callable.is_some())
            .finish()
    }
}

/// One tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleToolCallMessage {
    /// Provider-assigned correlation identifier
    pub id: String,

    /// Name of the invoked tool
    pub name: String,

    /// Raw serialized arguments, usually JSON text
    pub payload: String,

    /// Declared tool this call resolved to, if any.
    /// Shares the caller's executable; the caller keeps ownership of its tool list.
    #[serde(skip)]
    pub tool: Option<Tool>,
}

impl SingleToolCallMessage {
    /// Create an unresolved tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            payload: payload.into(),
            tool: None,
        }
    }

    /// Link this call to the declared tool with the same name.
    /// Returns whether a match was found.
    pub fn resolve(&mut self, tools: &[Tool]) -> bool {
        self.tool = tools.iter().find(|t| t.name == self.name).cloned();
        self.tool.is_some()
    }

    /// Parse the payload into JSON
    pub fn arguments(&self) -> LlmResult<Value> {
        serde_json::from_str(&self.payload).map_err(|e| LlmError::MalformedArguments {
            tool: self.name.clone(),
            message: e.to_string(),
        })
    }

    /// Parse the payload and run the resolved tool with it
    pub fn invoke(&self) -> LlmResult<Value> {
        let tool = self
            .tool
            .as_ref()
            .ok_or_else(|| LlmError::UnresolvedTool(self.name.clone()))?;
        let args = self.arguments()?;
        tool.call(args)
    }

    /// Same as [`invoke`](Self::invoke), bracketed by tool trace events
    pub fn invoke_traced(&self, instrumentation: &Instrumentation) -> LlmResult<Value> {
        let tool = self
            .tool
            .as_ref()
            .ok_or_else(|| LlmError::UnresolvedTool(self.name.clone()))?;
        instrumentation.start_tool_trace(tool, &Value::Object(self.payload_dict()));
        let result = self.arguments().and_then(|args| tool.call(args));
        match &result {
            Ok(output) => instrumentation.end_tool_trace(Some(output), None),
            Err(e) => instrumentation.end_tool_trace(None, Some(&e.to_string())),
        }
        result
    }

    /// Payload as a JSON object, for display and tracing only.
    /// Unparseable payloads yield an empty map.
    pub fn payload_dict(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!(tool = %self.name, "tool call payload is not an object: {}", other);
                Map::new()
            }
            Err(e) => {
                warn!(tool = %self.name, "failed to parse tool call payload: {}", e);
                Map::new()
            }
        }
    }
}

/// Assistant turn requesting one or more tool invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallsMessage {
    /// Comma-joined names of all invoked tools, for display
    pub name: String,

    /// Optional accompanying text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Requested invocations, in response order
    pub tool_calls: Vec<SingleToolCallMessage>,
}

impl ToolCallsMessage {
    /// Create a tool-calls message, deriving the display name from the calls
    pub fn new(content: Option<String>, tool_calls: Vec<SingleToolCallMessage>) -> Self {
        let name = tool_calls
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            name,
            content,
            tool_calls,
        }
    }

    /// Resolve every call against the declared tools.
    /// Returns the names of calls that matched no declared tool.
    pub fn resolve_tools(&mut self, tools: &[Tool]) -> Vec<String> {
        self.tool_calls
            .iter_mut()
            .filter_map(|call| (!call.resolve(tools)).then(|| call.name.clone()))
            .collect()
    }

    /// First requested call
    pub fn first(&self) -> Option<&SingleToolCallMessage> {
        self.tool_calls.first()
    }
}
