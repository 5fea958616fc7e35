//! Closure-backed tools

use crate::{Tool, ToolContext};
use adk_core::Result;
use adk_llm::tools::schema;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Synchronous tool body
pub type ToolFn = Arc<dyn Fn(Value, &mut ToolContext) -> Result<Value> + Send + Sync>;

/// A tool backed by a closure
///
/// # Example
///
/// ```
/// use adk_tools::{FunctionTool, Tool};
/// use serde_json::json;
///
/// let tool = FunctionTool::new("add", "Add two numbers", |params, _ctx| {
///     let a = params["a"].as_i64().unwrap_or(0);
///     let b = params["b"].as_i64().unwrap_or(0);
///     Ok(json!({ "sum": a + b }))
/// });
/// assert_eq!(tool.name(), "add");
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    input_schema: Value,
    long_running: bool,
    func: ToolFn,
}

impl FunctionTool {
    /// Create a tool from a closure
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value, &mut ToolContext) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: schema::empty_object(),
            long_running: false,
            func: Arc::new(func),
        }
    }

    /// Set the input schema
    pub fn with_input_schema(mut self, input_schema: Value) -> Self {
        self.input_schema = input_schema;
        self
    }

    /// Mark the tool as long-running
    pub fn long_running(mut self) -> Self {
        self.long_running = true;
        self
    }
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("long_running", &self.long_running)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    async fn execute(&self, params: Value, ctx: &mut ToolContext) -> Result<Value> {
        (self.func)(params, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    fn is_long_running(&self) -> bool {
        self.long_running
    }
}
