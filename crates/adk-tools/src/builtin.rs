//! Built-in control-flow tools
//!
//! These tools do no work of their own; they only set actions on the
//! response event:
//!
//! - [`ExitLoopTool`] asks the enclosing loop agent to stop
//! - [`TransferToAgentTool`] hands control to any agent by name
//! - [`TransferTool`] hands control to one fixed agent; leaf agents add one
//!   per child automatically

use crate::{Tool, ToolContext};
use adk_core::{Error, Result};
use adk_llm::tools::schema;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

/// Name prefix of per-child hand-off tools
pub const TRANSFER_TOOL_PREFIX: &str = "transfer_to_";

/// Stops the enclosing loop agent after the current event
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitLoopTool;

impl ExitLoopTool {
    pub const NAME: &'static str = "exit_loop";
}

#[async_trait]
impl Tool for ExitLoopTool {
    async fn execute(&self, _params: Value, ctx: &mut ToolContext) -> Result<Value> {
        debug!(agent = %ctx.agent_name(), "Loop exit requested");
        ctx.exit_loop();
        Ok(json!({}))
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Exits the loop. Call this function only when you are instructed to do so."
    }
}

/// Hands control to the agent named in the `agent_name` argument
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferToAgentTool;

impl TransferToAgentTool {
    pub const NAME: &'static str = "transfer_to_agent";
}

#[async_trait]
impl Tool for TransferToAgentTool {
    async fn execute(&self, params: Value, ctx: &mut ToolContext) -> Result<Value> {
        let target = params
            .get("agent_name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Tool("Missing required argument 'agent_name'".to_string()))?;
        ctx.transfer_to_agent(target);
        Ok(json!({ "transferred_to": target }))
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Transfer the question to another agent."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({ "agent_name": schema::string("Name of the agent to transfer to") }),
            &["agent_name"],
        )
    }
}

/// Hands control to one fixed agent
///
/// Named `transfer_to_<agent>` so the model can pick a hand-off target
/// from the tool list alone.
#[derive(Debug, Clone)]
pub struct TransferTool {
    name: String,
    description: String,
    target: String,
}

impl TransferTool {
    /// Create a hand-off tool for `agent_name`
    pub fn new(agent_name: impl Into<String>, agent_description: &str) -> Self {
        let target = agent_name.into();
        let description = if agent_description.is_empty() {
            format!("Transfer to {target}")
        } else {
            format!("Transfer to {agent_description}")
        };
        Self {
            name: format!("{TRANSFER_TOOL_PREFIX}{target}"),
            description,
            target,
        }
    }

    /// Agent this tool hands off to
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl Tool for TransferTool {
    async fn execute(&self, _params: Value, ctx: &mut ToolContext) -> Result<Value> {
        ctx.transfer_to_agent(self.target.clone());
        Ok(json!({ "transferred_to": self.target }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adk_core::{InvocationContext, Session, SessionKey};
    use std::sync::Arc;
    use tokio_test::assert_err;

    fn tool_ctx() -> ToolContext {
        let session = Arc::new(Session::new(SessionKey::new("app", "u", "s")));
        ToolContext::new(InvocationContext::new(session), "agent", "call-1")
    }

    #[tokio::test]
    async fn test_exit_loop_sets_dedicated_flag() {
        let mut ctx = tool_ctx();
        ExitLoopTool.execute(json!({}), &mut ctx).await.unwrap();
        assert!(ctx.actions().exit_loop);
        assert!(!ctx.actions().skip_summarization);
    }

    #[tokio::test]
    async fn test_transfer_to_agent() {
        let mut ctx = tool_ctx();
        let result = TransferToAgentTool
            .execute(json!({"agent_name": "billing"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result["transferred_to"], "billing");
        assert_eq!(ctx.actions().transfer_to_agent.as_deref(), Some("billing"));

        let mut ctx2 = tool_ctx();
        assert_err!(TransferToAgentTool.execute(json!({}), &mut ctx2).await);
        assert!(ctx2.actions().transfer_to_agent.is_none());
    }

    #[tokio::test]
    async fn test_transfer_tool_naming() {
        let tool = TransferTool::new("billing", "Handles invoices");
        assert_eq!(tool.name(), "transfer_to_billing");
        assert_eq!(tool.description(), "Transfer to Handles invoices");
        assert_eq!(TransferTool::new("support", "").description(), "Transfer to support");

        let mut ctx = tool_ctx();
        tool.execute(json!({}), &mut ctx).await.unwrap();
        assert_eq!(ctx.actions().transfer_to_agent.as_deref(), Some("billing"));
    }
}
