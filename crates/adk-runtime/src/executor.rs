//! Function call dispatch
//!
//! Turns one model event carrying function calls into one response event:
//! every call is looked up in the agent's [`ToolRegistry`] and executed in
//! order, and all results are merged into a single `tool` content. Tool
//! failures never abort the agent; they become `{"error": ...}` responses
//! the model can react to.

use crate::callbacks::LlmCallbacks;
use adk_core::{
    Content, Event, EventActions, FunctionCall, FunctionResponse, InvocationContext, Part, roles,
};
use adk_tools::{ToolContext, ToolRegistry};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Dispatches the function calls of model events for one agent
#[derive(Debug, Clone, Copy)]
pub struct ToolDispatcher<'a> {
    agent_name: &'a str,
    tools: &'a ToolRegistry,
    callbacks: &'a LlmCallbacks,
}

fn error_response(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

/// Function responses must be objects; other values are wrapped
fn into_response(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        other => json!({ "result": other }),
    }
}

impl<'a> ToolDispatcher<'a> {
    /// Create a dispatcher
    ///
    /// # Arguments
    ///
    /// * `agent_name` - Author of the response events
    /// * `tools` - Tools the agent may call
    /// * `callbacks` - Before/after tool hooks
    pub fn new(agent_name: &'a str, tools: &'a ToolRegistry, callbacks: &'a LlmCallbacks) -> Self {
        Self {
            agent_name,
            tools,
            callbacks,
        }
    }

    /// Execute every function call in `event` and build the response event
    pub async fn dispatch(&self, ctx: &InvocationContext, event: &Event) -> Event {
        let calls = event.function_calls();
        info!(
            agent = %self.agent_name,
            invocation_id = %ctx.invocation_id(),
            tool_count = calls.len(),
            "Dispatching function calls"
        );

        let mut content = Content::new(roles::TOOL);
        let mut actions = EventActions::default();
        let mut long_running_tool_ids = Vec::new();

        for call in calls {
            let (response, call_actions, long_running) = self.execute(ctx, call).await;
            if let Some(call_actions) = call_actions {
                actions.merge(call_actions);
            }
            if long_running {
                long_running_tool_ids.push(call.id.clone());
            }
            content.parts.push(Part::FunctionResponse(FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response,
            }));
        }

        let mut response = Event::new(self.agent_name)
            .with_invocation_id(ctx.invocation_id())
            .with_branch(ctx.branch().map(str::to_string))
            .with_content(content)
            .with_actions(actions);
        response.long_running_tool_ids = long_running_tool_ids;
        response
    }

    /// Run one call; actions are only kept when the tool succeeded
    async fn execute(
        &self,
        ctx: &InvocationContext,
        call: &FunctionCall,
    ) -> (Value, Option<EventActions>, bool) {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(agent = %self.agent_name, tool = %call.name, "Tool not found");
            return (
                error_response(format!("Tool '{}' not found", call.name)),
                None,
                false,
            );
        };

        if let Err(e) = self.callbacks.run_before_tool(ctx, call) {
            warn!(tool = %call.name, error = %e, "Before-tool callback rejected call");
            return (error_response(e), None, false);
        }

        let mut tool_ctx = ToolContext::new(ctx.clone(), self.agent_name, call.id.clone());
        let start_time = Instant::now();
        let result = tool.execute(call.args.clone(), &mut tool_ctx).await;
        let duration_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                let value = into_response(value);
                if let Err(e) = self.callbacks.run_after_tool(ctx, call, &value) {
                    warn!(tool = %call.name, error = %e, "After-tool callback rejected result");
                    return (error_response(e), None, false);
                }
                debug!(tool = %call.name, duration_ms, "Tool execution succeeded");
                (value, Some(tool_ctx.into_actions()), tool.is_long_running())
            }
            Err(e) => {
                warn!(tool = %call.name, duration_ms, error = %e, "Tool execution failed");
                (error_response(e), None, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adk_core::{Error, Session, SessionKey};
    use adk_tools::{ExitLoopTool, FunctionTool};
    use std::sync::Arc;

    fn ctx() -> InvocationContext {
        let session = Arc::new(Session::new(SessionKey::new("app", "u", "s")));
        InvocationContext::new(session).with_branch("root.worker")
    }

    fn call_event(calls: Vec<FunctionCall>) -> Event {
        let mut content = Content::new(roles::MODEL);
        for call in calls {
            content.parts.push(Part::FunctionCall(call));
        }
        Event::new("model").with_content(content)
    }

    fn registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FunctionTool::new("add", "Add", |params, ctx| {
            let sum = params["a"].as_i64().unwrap_or(0) + params["b"].as_i64().unwrap_or(0);
            ctx.set_state("last_sum", json!(sum));
            Ok(json!(sum))
        })));
        registry.register(Arc::new(FunctionTool::new("fail", "Fails", |_, ctx| {
            ctx.set_state("should_not_leak", json!(true));
            Err(Error::Tool("boom".to_string()))
        })));
        registry.register(Arc::new(
            FunctionTool::new("job", "Background job", |_, _| Ok(json!({"status": "pending"})))
                .long_running(),
        ));
        registry.register(Arc::new(ExitLoopTool));
        registry
    }

    #[tokio::test]
    async fn test_responses_are_merged_into_one_event() {
        let tools = registry();
        let callbacks = LlmCallbacks::default();
        let dispatcher = ToolDispatcher::new("worker", &tools, &callbacks);
        let ctx = ctx();

        let add = FunctionCall::new("add", json!({"a": 2, "b": 3}));
        let exit = FunctionCall::new("exit_loop", json!({}));
        let event = call_event(vec![add.clone(), exit.clone()]);

        let response = dispatcher.dispatch(&ctx, &event).await;

        assert_eq!(response.author, "worker");
        assert_eq!(response.invocation_id, ctx.invocation_id());
        assert_eq!(response.branch.as_deref(), Some("root.worker"));
        assert_eq!(response.content.as_ref().map(|c| c.role.as_str()), Some(roles::TOOL));

        let responses = response.function_responses();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id, add.id);
        assert_eq!(responses[0].response, json!({"result": 5}));
        assert_eq!(responses[1].name, "exit_loop");

        assert!(response.requests_loop_exit());
        assert_eq!(response.actions.state_delta.get("last_sum"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_failures_become_error_responses() {
        let tools = registry();
        let callbacks = LlmCallbacks::default();
        let dispatcher = ToolDispatcher::new("worker", &tools, &callbacks);

        let event = call_event(vec![
            FunctionCall::new("fail", json!({})),
            FunctionCall::new("missing", json!({})),
        ]);
        let response = dispatcher.dispatch(&ctx(), &event).await;

        let responses = response.function_responses();
        assert!(responses[0].response["error"].as_str().unwrap().contains("boom"));
        assert!(responses[1].response["error"].as_str().unwrap().contains("not found"));
        assert!(response.actions.state_delta.is_empty());
    }

    #[tokio::test]
    async fn test_long_running_ids_are_recorded() {
        let tools = registry();
        let callbacks = LlmCallbacks::default();
        let dispatcher = ToolDispatcher::new("worker", &tools, &callbacks);

        let job = FunctionCall::new("job", json!({}));
        let response = dispatcher.dispatch(&ctx(), &call_event(vec![job.clone()])).await;
        assert_eq!(response.long_running_tool_ids, vec![job.id]);
    }

    #[tokio::test]
    async fn test_tool_callbacks() {
        let tools = registry();
        let callbacks = LlmCallbacks {
            before_tool: Some(Arc::new(|_: &InvocationContext, call: &FunctionCall| {
                if call.name == "exit_loop" {
                    Err(Error::Callback("not allowed".to_string()))
                } else {
                    Ok(())
                }
            })),
            after_tool: Some(Arc::new(
                |_: &InvocationContext, _: &FunctionCall, result: &Value| {
                    if result.get("result") == Some(&json!(5)) {
                        Ok(())
                    } else {
                        Err(Error::Callback("unexpected".to_string()))
                    }
                },
            )),
            ..LlmCallbacks::default()
        };
        let dispatcher = ToolDispatcher::new("worker", &tools, &callbacks);

        let event = call_event(vec![
            FunctionCall::new("exit_loop", json!({})),
            FunctionCall::new("add", json!({"a": 2, "b": 3})),
            FunctionCall::new("add", json!({"a": 1, "b": 1})),
        ]);
        let response = dispatcher.dispatch(&ctx(), &event).await;
        let responses = response.function_responses();

        assert!(responses[0].response.get("error").is_some());
        assert_eq!(responses[1].response, json!({"result": 5}));
        assert!(responses[2].response.get("error").is_some());
        assert!(!response.requests_loop_exit());
    }
}
