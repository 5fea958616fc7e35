//! Tool trait definition

use crate::ToolContext;
use adk_core::Result;
use adk_llm::ToolDeclaration;
use adk_llm::tools::schema;
use async_trait::async_trait;
use serde_json::Value;

/// Trait for tools that agents can execute
///
/// Tools are functions a leaf agent calls when the model requests them.
/// Each tool provides a name, a description and a JSON schema for its input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with given parameters
    ///
    /// # Arguments
    ///
    /// * `params` - Tool input as JSON value (should match input_schema)
    /// * `ctx` - Per-call context; record side effects on it
    ///
    /// # Returns
    ///
    /// Tool output as JSON value
    async fn execute(&self, params: Value, ctx: &mut ToolContext) -> Result<Value>;

    /// Get the tool's name
    ///
    /// Must be unique within a ToolRegistry; the model calls the tool by it
    fn name(&self) -> &str;

    /// Get the tool's description
    ///
    /// This description helps the model understand when to use this tool
    fn description(&self) -> &str;

    /// Get the tool's input schema (JSON Schema format)
    fn input_schema(&self) -> Value {
        schema::empty_object()
    }

    /// Whether the call returns before the work completes
    fn is_long_running(&self) -> bool {
        false
    }

    /// Declaration advertised to the model
    fn declaration(&self) -> ToolDeclaration {
        let declaration = ToolDeclaration::new(self.name(), self.description(), self.input_schema());
        if self.is_long_running() {
            declaration.long_running()
        } else {
            declaration
        }
    }
}
