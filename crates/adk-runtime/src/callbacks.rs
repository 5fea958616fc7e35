//! Model and tool callbacks for leaf agents

use adk_core::{AgentCallback, FunctionCall, InvocationContext, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Hook run before a tool executes; an error skips the tool
pub type BeforeToolCallback =
    Arc<dyn Fn(&InvocationContext, &FunctionCall) -> Result<()> + Send + Sync>;

/// Hook run after a tool succeeded; an error replaces the result with an error response
pub type AfterToolCallback =
    Arc<dyn Fn(&InvocationContext, &FunctionCall, &Value) -> Result<()> + Send + Sync>;

/// Callbacks around backend calls and tool dispatch
#[derive(Clone, Default)]
pub struct LlmCallbacks {
    pub before_model: Option<AgentCallback>,
    pub after_model: Option<AgentCallback>,
    pub before_tool: Option<BeforeToolCallback>,
    pub after_tool: Option<AfterToolCallback>,
}

impl LlmCallbacks {
    pub fn run_before_model(&self, ctx: &InvocationContext) -> Result<()> {
        self.before_model.as_ref().map_or(Ok(()), |callback| callback(ctx))
    }

    pub fn run_after_model(&self, ctx: &InvocationContext) -> Result<()> {
        self.after_model.as_ref().map_or(Ok(()), |callback| callback(ctx))
    }

    pub fn run_before_tool(&self, ctx: &InvocationContext, call: &FunctionCall) -> Result<()> {
        self.before_tool
            .as_ref()
            .map_or(Ok(()), |callback| callback(ctx, call))
    }

    pub fn run_after_tool(
        &self,
        ctx: &InvocationContext,
        call: &FunctionCall,
        result: &Value,
    ) -> Result<()> {
        self.after_tool
            .as_ref()
            .map_or(Ok(()), |callback| callback(ctx, call, result))
    }
}

impl fmt::Debug for LlmCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCallbacks")
            .field("before_model", &self.before_model.is_some())
            .field("after_model", &self.after_model.is_some())
            .field("before_tool", &self.before_tool.is_some())
            .field("after_tool", &self.after_tool.is_some())
            .finish()
    }
}
