//! Per-call tool context

use adk_core::{
    ArtifactKey, Error, EventActions, InvocationContext, Result, SearchMemoryResponse, State,
};
use serde_json::{Value, json};

/// Context handed to a tool for one function call
///
/// Side effects a tool wants attached to the response event (state
/// changes, hand-off, loop exit) are recorded in [`ToolContext::actions`];
/// the session applies state deltas when the event is persisted.
#[derive(Debug, Clone)]
pub struct ToolContext {
    invocation: InvocationContext,
    agent_name: String,
    function_call_id: String,
    actions: EventActions,
}

impl ToolContext {
    /// Create a context for one call
    pub fn new(
        invocation: InvocationContext,
        agent_name: impl Into<String>,
        function_call_id: impl Into<String>,
    ) -> Self {
        Self {
            invocation,
            agent_name: agent_name.into(),
            function_call_id: function_call_id.into(),
            actions: EventActions::default(),
        }
    }

    pub fn invocation(&self) -> &InvocationContext {
        &self.invocation
    }

    /// Name of the agent dispatching the call
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn function_call_id(&self) -> &str {
        &self.function_call_id
    }

    /// Current session state (read-only view; write through [`ToolContext::set_state`])
    pub fn state(&self) -> &State {
        self.invocation.state()
    }

    pub fn actions(&self) -> &EventActions {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut EventActions {
        &mut self.actions
    }

    /// Consume the context, returning the recorded actions
    pub fn into_actions(self) -> EventActions {
        self.actions
    }

    // =========== Action Helpers ===========

    /// Record a state change, applied when the response event is persisted
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.actions.state_delta.insert(key.into(), value);
    }

    /// Hand control to another agent after this call
    pub fn transfer_to_agent(&mut self, agent_name: impl Into<String>) {
        self.actions.transfer_to_agent = Some(agent_name.into());
    }

    /// Ask the enclosing loop agent to stop
    pub fn exit_loop(&mut self) {
        self.actions.exit_loop = true;
    }

    /// Escalate to the parent agent
    pub fn escalate(&mut self) {
        self.actions.escalate = true;
    }

    /// The result should be shown as-is rather than summarized
    pub fn skip_summarization(&mut self) {
        self.actions.skip_summarization = true;
    }

    // =========== Services ===========

    /// Search long-term memory for the session's user
    pub async fn search_memory(&self, query: &str) -> Result<SearchMemoryResponse> {
        let service = self
            .invocation
            .memory_service()
            .ok_or_else(|| Error::Tool("No memory service configured".to_string()))?;
        let session = self.invocation.session();
        service
            .search_memory(session.app_name(), session.user_id(), query)
            .await
    }

    /// Save an artifact in the session and record the new version
    pub async fn save_artifact(&mut self, filename: &str, data: Vec<u8>) -> Result<u32> {
        let service = self
            .invocation
            .artifact_service()
            .ok_or_else(|| Error::Tool("No artifact service configured".to_string()))?;
        let key = ArtifactKey::new(self.invocation.session().key().clone(), filename);
        let version = service.save_artifact(&key, data, None).await?;
        self.actions
            .artifact_delta
            .insert(filename.to_string(), json!(version));
        Ok(version)
    }

    /// Load the latest (or a given) version of a session artifact
    pub async fn load_artifact(&self, filename: &str, version: Option<u32>) -> Result<Option<Vec<u8>>> {
        let service = self
            .invocation
            .artifact_service()
            .ok_or_else(|| Error::Tool("No artifact service configured".to_string()))?;
        let key = ArtifactKey::new(self.invocation.session().key().clone(), filename);
        service.load_artifact(&key, version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adk_core::{InMemoryArtifactService, Session, SessionKey};
    use std::sync::Arc;

    fn invocation() -> InvocationContext {
        InvocationContext::new(Arc::new(Session::new(SessionKey::new("app", "u", "s"))))
    }

    #[test]
    fn test_actions_are_recorded() {
        let mut ctx = ToolContext::new(invocation(), "agent", "call-1");
        ctx.set_state("k", json!(1));
        ctx.exit_loop();
        ctx.transfer_to_agent("helper");

        assert_eq!(ctx.function_call_id(), "call-1");
        // Recorded only; state is untouched until the event is persisted
        assert!(ctx.state().get("k").is_none());

        let actions = ctx.into_actions();
        assert!(actions.exit_loop);
        assert_eq!(actions.transfer_to_agent.as_deref(), Some("helper"));
        assert_eq!(actions.state_delta.get("k"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_missing_services_are_tool_errors() {
        let mut ctx = ToolContext::new(invocation(), "agent", "call-1");
        assert!(matches!(ctx.search_memory("x").await, Err(Error::Tool(_))));
        assert!(matches!(ctx.save_artifact("a", vec![]).await, Err(Error::Tool(_))));
    }

    #[tokio::test]
    async fn test_artifact_round_trip_records_delta() {
        let invocation = invocation().with_artifact_service(Arc::new(InMemoryArtifactService::new()));
        let mut ctx = ToolContext::new(invocation, "agent", "call-1");

        assert_eq!(ctx.save_artifact("notes.txt", b"hi".to_vec()).await.unwrap(), 1);
        assert_eq!(
            ctx.load_artifact("notes.txt", None).await.unwrap(),
            Some(b"hi".to_vec())
        );
        assert_eq!(ctx.actions().artifact_delta.get("notes.txt"), Some(&json!(1)));
    }
}
