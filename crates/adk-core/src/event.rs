//! Event and content model
//!
//! An [`Event`] is one unit of conversation output: who produced it, what was
//! said ([`Content`]), and which side effects ([`EventActions`]) ride along
//! with it. Events are created once and then only moved or cloned; nothing
//! downstream rewrites their fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Well-known content roles
pub mod roles {
    /// Caller input
    pub const USER: &str = "user";
    /// Generated by an inference backend
    pub const MODEL: &str = "model";
    /// Instructions assembled by an agent
    pub const SYSTEM: &str = "system";
    /// Results of tool dispatch
    pub const TOOL: &str = "tool";
}

/// Author used for events synthesized from caller input
pub const USER_AUTHOR: &str = "user";

/// A structured request from the model to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Call id, echoed back in the matching [`FunctionResponse`]
    #[serde(default)]
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool arguments
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    /// Create a function call with a freshly generated id
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: format!("call-{}", Uuid::new_v4()),
            name: name.into(),
            args,
        }
    }
}

/// The result of a dispatched [`FunctionCall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Id of the call this answers
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool output (an object; errors are reported as `{"error": ...}`)
    pub response: Value,
}

/// One piece of [`Content`]
///
/// Serialized externally tagged (`{"text": "..."}`), so consumers that only
/// understand text can skip unknown part kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Part {
    /// Plain text
    Text(String),
    /// Tool invocation requested by the model
    FunctionCall(FunctionCall),
    /// Tool result
    FunctionResponse(FunctionResponse),
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Text of this part, if it is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Function call carried by this part, if any
    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    /// Function response carried by this part, if any
    pub fn as_function_response(&self) -> Option<&FunctionResponse> {
        match self {
            Self::FunctionResponse(response) => Some(response),
            _ => None,
        }
    }
}

/// One turn of conversation: a speaker role and its ordered parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Free-form speaker tag (see [`roles`])
    pub role: String,
    /// Ordered parts
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create empty content for a role
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: Vec::new(),
        }
    }

    /// Single-text content authored by the user
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(roles::USER).with_text(text)
    }

    /// Single-text content authored by a model
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(roles::MODEL).with_text(text)
    }

    /// Single-text system instruction
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(roles::SYSTEM).with_text(text)
    }

    /// Append a text part
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_part(Part::text(text))
    }

    /// Append a part
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// First text part, if any
    pub fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }

    /// All function calls, in part order
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts.iter().filter_map(Part::as_function_call).collect()
    }

    /// All function responses, in part order
    pub fn function_responses(&self) -> Vec<&FunctionResponse> {
        self.parts
            .iter()
            .filter_map(Part::as_function_response)
            .collect()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Side effects attached to an [`Event`]
///
/// Always present on an event; the default value means "no action".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventActions {
    /// Name of an agent to hand control to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_to_agent: Option<String>,

    /// Escalate to the parent agent
    #[serde(default, skip_serializing_if = "is_false")]
    pub escalate: bool,

    /// The tool result should not be summarized by the model
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_summarization: bool,

    /// Ask the enclosing loop agent to stop
    #[serde(default, skip_serializing_if = "is_false")]
    pub exit_loop: bool,

    /// Keys to merge into session state
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub state_delta: HashMap<String, Value>,

    /// Artifact changes keyed by artifact name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub artifact_delta: HashMap<String, Value>,

    /// Opaque auth requests raised by tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_auth_configs: Vec<Value>,
}

impl EventActions {
    /// True when no action is requested
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold `other` into `self`; flags are OR-ed, maps are extended and a
    /// later transfer target replaces an earlier one.
    pub fn merge(&mut self, other: EventActions) {
        if other.transfer_to_agent.is_some() {
            self.transfer_to_agent = other.transfer_to_agent;
        }
        self.escalate |= other.escalate;
        self.skip_summarization |= other.skip_summarization;
        self.exit_loop |= other.exit_loop;
        self.state_delta.extend(other.state_delta);
        self.artifact_delta.extend(other.artifact_delta);
        self.requested_auth_configs
            .extend(other.requested_auth_configs);
    }
}

/// One immutable unit of agent output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique id, never reused
    pub id: String,

    /// Invocation that produced this event
    #[serde(default)]
    pub invocation_id: String,

    /// Creation time
    pub timestamp: DateTime<Utc>,

    /// Producing agent name, or [`USER_AUTHOR`]
    pub author: String,

    /// Conversation content, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,

    /// Branch label of the producing agent (`parent.child` inside parallel runs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Marks the terminal event of one agent turn
    #[serde(default)]
    pub is_final_response: bool,

    /// Attached side effects
    #[serde(default)]
    pub actions: EventActions,

    /// Function call ids of long-running tools still pending
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_running_tool_ids: Vec<String>,
}

impl Event {
    /// Create an event with a unique id and the current timestamp
    pub fn new(author: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), author)
    }

    /// Create an event with a caller-supplied id
    pub fn with_id(id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            invocation_id: String::new(),
            timestamp: Utc::now(),
            author: author.into(),
            content: None,
            branch: None,
            is_final_response: false,
            actions: EventActions::default(),
            long_running_tool_ids: Vec::new(),
        }
    }

    /// Set the invocation id
    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = invocation_id.into();
        self
    }

    /// Set the content
    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    /// Set the branch label
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    /// Set the action bundle
    pub fn with_actions(mut self, actions: EventActions) -> Self {
        self.actions = actions;
        self
    }

    /// Mark as the final response of the turn
    pub fn final_response(mut self) -> Self {
        self.is_final_response = true;
        self
    }

    /// Whether this is the final response of the turn
    pub fn is_final(&self) -> bool {
        self.is_final_response
    }

    /// First text part of the content, if any
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(Content::text)
    }

    /// Function calls in the content
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.content
            .as_ref()
            .map(Content::function_calls)
            .unwrap_or_default()
    }

    /// Function responses in the content
    pub fn function_responses(&self) -> Vec<&FunctionResponse> {
        self.content
            .as_ref()
            .map(Content::function_responses)
            .unwrap_or_default()
    }

    /// Whether the content requests any tool invocation
    pub fn has_function_calls(&self) -> bool {
        self.content
            .as_ref()
            .is_some_and(|c| c.parts.iter().any(|p| p.as_function_call().is_some()))
    }

    /// Whether the actions ask an enclosing loop to stop
    pub fn requests_loop_exit(&self) -> bool {
        self.actions.exit_loop
    }
}
