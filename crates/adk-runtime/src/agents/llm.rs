//! Model-backed leaf agent

use crate::callbacks::{AfterToolCallback, BeforeToolCallback, LlmCallbacks};
use crate::executor::ToolDispatcher;
use adk_core::{
    Agent, AgentBase, AgentTree, Content, Error, Event, EventStream, FunctionCall,
    InvocationContext, Result, build_agent, next_event,
};
use adk_llm::{GenerateContentConfig, LLMProvider, LLMRegistry, LlmRequest};
use adk_tools::{Tool, ToolRegistry, TransferTool};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Which conversation history goes into the outbound request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeContents {
    /// Instruction followed by the content of every session event
    #[default]
    Default,
    /// Instruction only
    None,
}

/// An agent that asks a model what to do and dispatches its tool calls
///
/// The backend is named by a model identifier and resolved through an
/// [`LLMRegistry`] on first use; the handle is cached for the agent's
/// lifetime. Every child agent is advertised to the model as a
/// `transfer_to_<child>` tool.
///
/// # Example
///
/// ```
/// use adk_llm::{LLMProvider, LLMRegistry, ScriptedLLM};
/// use adk_runtime::LlmAgent;
/// use std::sync::Arc;
///
/// let registry = Arc::new(LLMRegistry::new());
/// registry.register("scripted", |model| {
///     Ok(Arc::new(ScriptedLLM::new(model)) as Arc<dyn LLMProvider>)
/// });
///
/// let agent = LlmAgent::builder("assistant")
///     .model("scripted-1")
///     .registry(registry)
///     .instruction("Answer briefly.")
///     .output_key("answer")
///     .build()
///     .unwrap();
/// assert_eq!(agent.canonical_instruction(), "Answer briefly.");
/// ```
pub struct LlmAgent {
    base: AgentBase,
    model: String,
    registry: Option<Arc<LLMRegistry>>,
    resolved: OnceCell<Arc<dyn LLMProvider>>,
    instruction: String,
    global_instruction: String,
    config: Option<GenerateContentConfig>,
    output_key: Option<String>,
    include_contents: IncludeContents,
    tools: ToolRegistry,
    callbacks: LlmCallbacks,
}

impl LlmAgent {
    /// Create a builder
    pub fn builder(name: impl Into<String>) -> LlmAgentBuilder {
        LlmAgentBuilder::new(name)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    pub fn include_contents(&self) -> IncludeContents {
        self.include_contents
    }

    /// Attached tools plus one transfer tool per child, in that order
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Global instruction and instruction joined by a blank line
    pub fn canonical_instruction(&self) -> String {
        match (self.global_instruction.is_empty(), self.instruction.is_empty()) {
            (true, _) => self.instruction.clone(),
            (false, true) => self.global_instruction.clone(),
            (false, false) => format!("{}\n\n{}", self.global_instruction, self.instruction),
        }
    }

    /// Resolve the backend once and return the cached handle afterwards
    pub async fn canonical_model(&self) -> adk_llm::Result<Arc<dyn LLMProvider>> {
        let handle = self
            .resolved
            .get_or_try_init(|| async {
                match &self.registry {
                    Some(registry) => registry.resolve(&self.model).await,
                    None => Err(adk_llm::LLMError::ConfigurationError(format!(
                        "No model registry for '{}'",
                        self.model
                    ))),
                }
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    /// Assemble the outbound request for this invocation
    pub fn build_request(&self, ctx: &InvocationContext) -> LlmRequest {
        let mut builder = LlmRequest::builder(self.model.clone())
            .config(self.config.clone())
            .tools(self.tools.declarations());

        let instruction = self.canonical_instruction();
        if !instruction.is_empty() {
            builder = builder.add_content(Content::system(instruction));
        }
        if self.include_contents == IncludeContents::Default {
            builder = builder.contents(
                ctx.session()
                    .events()
                    .into_iter()
                    .filter_map(|event| event.content),
            );
        }
        builder.build()
    }

    /// Mark a backend event as produced by this agent in this invocation
    fn adopt(&self, mut event: Event, ctx: &InvocationContext) -> Event {
        event.author = self.name().to_string();
        event.invocation_id = ctx.invocation_id().to_string();
        event.branch = ctx.branch().map(str::to_string);
        event
    }

    /// Find a hand-off target anywhere in the tree this agent belongs to
    fn transfer_target(self: &Arc<Self>, name: &str) -> Option<Arc<dyn Agent>> {
        let me: Arc<dyn Agent> = Arc::clone(self) as Arc<dyn Agent>;
        me.root_agent().find_agent(name)
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn run_async(self: Arc<Self>, ctx: InvocationContext) -> Result<EventStream> {
        let agent = self;
        let stream = async_stream::stream! {
            let name = agent.name().to_string();
            info!(agent = %name, invocation_id = %ctx.invocation_id(), "Agent started");

            if let Err(e) = agent.base.callbacks().run_before(&ctx) {
                warn!(agent = %name, error = %e, "Before-agent callback failed");
                return;
            }
            if let Err(e) = agent.callbacks.run_before_model(&ctx) {
                warn!(agent = %name, error = %e, "Before-model callback failed");
                return;
            }

            let model = match agent.canonical_model().await {
                Ok(model) => model,
                Err(e) => {
                    warn!(agent = %name, model = %agent.model, error = %e, "Model resolution failed");
                    return;
                }
            };

            let request = agent.build_request(&ctx);
            debug!(
                agent = %name,
                contents = request.contents.len(),
                tool_count = request.tools.len(),
                "Sending request to model"
            );
            let mut responses = match model.generate_content(request).await {
                Ok(responses) => responses,
                Err(e) => {
                    warn!(agent = %name, error = %e, "Model request failed");
                    return;
                }
            };

            let dispatcher = ToolDispatcher::new(&name, &agent.tools, &agent.callbacks);
            loop {
                let item = tokio::select! {
                    biased;
                    () = ctx.cancelled() => None,
                    item = responses.next() => item,
                };
                let Some(item) = item else { break };
                let event = match item {
                    Ok(event) => agent.adopt(event, &ctx),
                    Err(e) => {
                        warn!(agent = %name, error = %e, "Model stream failed");
                        return;
                    }
                };

                if event.has_function_calls() {
                    let response = dispatcher.dispatch(&ctx, &event).await;
                    let transfer = response.actions.transfer_to_agent.clone();
                    yield response;

                    let Some(target_name) = transfer else { continue };
                    if target_name == name {
                        warn!(agent = %name, "Ignoring transfer to self");
                        continue;
                    }
                    let Some(target) = agent.transfer_target(&target_name) else {
                        warn!(agent = %name, target = %target_name, "Transfer target not found");
                        continue;
                    };

                    info!(agent = %name, target = %target_name, "Transferring control");
                    match target.run_async(ctx.clone()).await {
                        Ok(mut relayed) => {
                            while let Some(event) = next_event(&mut relayed, &ctx).await {
                                yield event;
                            }
                        }
                        Err(e) => warn!(agent = %name, target = %target_name, error = %e, "Transfer target failed to start"),
                    }
                    // The target owns the rest of the turn
                    break;
                }

                let output = match (&agent.output_key, event.is_final()) {
                    (Some(key), true) => event.text().map(|text| (key.clone(), text.to_string())),
                    _ => None,
                };
                yield event;
                if let Some((key, text)) = output {
                    debug!(agent = %name, key = %key, "Storing output in session state");
                    ctx.state().set(key, json!(text));
                }
            }

            if ctx.is_cancelled() {
                debug!(agent = %name, "Agent cancelled");
                return;
            }
            if let Err(e) = agent.callbacks.run_after_model(&ctx) {
                warn!(agent = %name, error = %e, "After-model callback failed");
                return;
            }
            if let Err(e) = agent.base.callbacks().run_after(&ctx) {
                warn!(agent = %name, error = %e, "After-agent callback failed");
                return;
            }
            info!(agent = %name, invocation_id = %ctx.invocation_id(), "Agent finished");
        };
        Ok(stream.boxed())
    }
}

/// Builder for [`LlmAgent`]
pub struct LlmAgentBuilder {
    base: AgentBase,
    model: Option<String>,
    registry: Option<Arc<LLMRegistry>>,
    llm: Option<Arc<dyn LLMProvider>>,
    instruction: String,
    global_instruction: String,
    config: Option<GenerateContentConfig>,
    output_key: Option<String>,
    include_contents: IncludeContents,
    tools: Vec<Arc<dyn Tool>>,
    callbacks: LlmCallbacks,
}

impl LlmAgentBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: AgentBase::new(name),
            model: None,
            registry: None,
            llm: None,
            instruction: String::new(),
            global_instruction: String::new(),
            config: None,
            output_key: None,
            include_contents: IncludeContents::Default,
            tools: Vec::new(),
            callbacks: LlmCallbacks::default(),
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.base = self.base.with_description(description);
        self
    }

    /// Set the model identifier resolved through the registry
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the registry used to resolve the model
    pub fn registry(mut self, registry: Arc<LLMRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use an already resolved backend handle
    pub fn llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Set the instruction
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Set the instruction shared by a family of agents
    pub fn global_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.global_instruction = instruction.into();
        self
    }

    /// Set the generation settings
    pub fn generate_content_config(mut self, config: GenerateContentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Write the final response text into session state under `key`
    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Choose which history goes into requests
    pub fn include_contents(mut self, include_contents: IncludeContents) -> Self {
        self.include_contents = include_contents;
        self
    }

    /// Attach a tool
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Attach several tools
    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Attach a child agent
    pub fn sub_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.base = self.base.with_sub_agent(agent);
        self
    }

    /// Attach several child agents
    pub fn sub_agents(mut self, agents: impl IntoIterator<Item = Arc<dyn Agent>>) -> Self {
        self.base = self.base.with_sub_agents(agents);
        self
    }

    pub fn before_agent_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InvocationContext) -> Result<()> + Send + Sync + 'static,
    {
        self.base = self.base.with_before_agent_callback(callback);
        self
    }

    pub fn after_agent_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InvocationContext) -> Result<()> + Send + Sync + 'static,
    {
        self.base = self.base.with_after_agent_callback(callback);
        self
    }

    pub fn before_model_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InvocationContext) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.before_model = Some(Arc::new(callback));
        self
    }

    pub fn after_model_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InvocationContext) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.after_model = Some(Arc::new(callback));
        self
    }

    pub fn before_tool_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InvocationContext, &FunctionCall) -> Result<()> + Send + Sync + 'static,
    {
        let callback: BeforeToolCallback = Arc::new(callback);
        self.callbacks.before_tool = Some(callback);
        self
    }

    pub fn after_tool_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InvocationContext, &FunctionCall, &Value) -> Result<()> + Send + Sync + 'static,
    {
        let callback: AfterToolCallback = Arc::new(callback);
        self.callbacks.after_tool = Some(callback);
        self
    }

    /// Build the agent
    pub fn build(self) -> Result<Arc<LlmAgent>> {
        let model = match (self.model, &self.llm) {
            (Some(model), _) => model,
            (None, Some(llm)) => llm.model_name().to_string(),
            (None, None) => {
                return Err(Error::InitializationFailed("Model not set".to_string()));
            }
        };
        if self.registry.is_none() && self.llm.is_none() {
            return Err(Error::InitializationFailed(
                "Model registry not set".to_string(),
            ));
        }

        let tools = ToolRegistry::new();
        for tool in self.tools {
            if tools.get(tool.name()).is_some() {
                return Err(Error::InitializationFailed(format!(
                    "Duplicate tool name '{}'",
                    tool.name()
                )));
            }
            tools.register(tool);
        }
        for child in self.base.sub_agents() {
            let transfer = TransferTool::new(child.name(), child.description());
            if tools.get(transfer.name()).is_some() {
                return Err(Error::InitializationFailed(format!(
                    "Tool name '{}' collides with a transfer tool",
                    transfer.name()
                )));
            }
            tools.register(Arc::new(transfer));
        }

        let resolved = match self.llm {
            Some(llm) => OnceCell::new_with(Some(llm)),
            None => OnceCell::new(),
        };

        build_agent(self.base, |base| LlmAgent {
            base,
            model,
            registry: self.registry,
            resolved,
            instruction: self.instruction,
            global_instruction: self.global_instruction,
            config: self.config,
            output_key: self.output_key,
            include_contents: self.include_contents,
            tools,
            callbacks: self.callbacks,
        })
    }
}
