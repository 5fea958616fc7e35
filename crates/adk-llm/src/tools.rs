//! Tool declarations sent to the backend

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool the model may call, as advertised in an [`LlmRequest`](crate::LlmRequest)
///
/// The name must match the tool that will handle the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the call arguments
    pub parameters: Value,
    /// The call returns before the work completes
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_long_running: bool,
}

impl ToolDeclaration {
    /// Create a new tool declaration
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            is_long_running: false,
        }
    }

    /// Mark the tool as long-running
    pub fn long_running(mut self) -> Self {
        self.is_long_running = true;
        self
    }
}

/// Helpers to build JSON schemas for tool parameters
pub mod schema {
    use serde_json::{Value, json};

    /// Object schema with the given properties
    ///
    /// # Example
    ///
    /// ```
    /// use adk_llm::tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({ "agent_name": schema::string("Agent to hand off to") }),
    ///     &["agent_name"],
    /// );
    /// assert_eq!(schema["required"][0], "agent_name");
    /// ```
    pub fn object(properties: Value, required: &[&str]) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Object schema without properties
    pub fn empty_object() -> Value {
        object(json!({}), &[])
    }

    pub fn string(description: &str) -> Value {
        json!({ "type": "string", "description": description })
    }

    pub fn integer(description: &str) -> Value {
        json!({ "type": "integer", "description": description })
    }

    pub fn boolean(description: &str) -> Value {
        json!({ "type": "boolean", "description": description })
    }
}
