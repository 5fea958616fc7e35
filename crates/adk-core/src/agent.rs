//! Core Agent trait definition
//!
//! Every agent owns an [`AgentBase`] holding its identity, its children and
//! a non-owning back-reference to its parent. Concrete agents only add their
//! variant-specific behaviour on top of it and implement
//! [`Agent::run_async`].
//!
//! Trees are built bottom-up: children are created first and handed to the
//! parent's constructor, which goes through [`build_agent`] so the parent
//! link is set before the parent becomes visible. Callers are expected to
//! build acyclic trees; attaching an agent below itself is not detected.

use crate::context::InvocationContext;
use crate::error::{Error, Result};
use crate::event::USER_AUTHOR;
use crate::stream::EventStream;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Lifecycle hook run around an agent invocation
///
/// Returning an error ends the run early; no further events are produced.
pub type AgentCallback = Arc<dyn Fn(&InvocationContext) -> Result<()> + Send + Sync>;

/// Before/after hooks bracketing one `run_async` call
#[derive(Clone, Default)]
pub struct AgentCallbacks {
    pub before_agent: Option<AgentCallback>,
    pub after_agent: Option<AgentCallback>,
}

impl AgentCallbacks {
    /// Run the before hook, if any
    pub fn run_before(&self, ctx: &InvocationContext) -> Result<()> {
        match &self.before_agent {
            Some(callback) => callback(ctx),
            None => Ok(()),
        }
    }

    /// Run the after hook, if any
    pub fn run_after(&self, ctx: &InvocationContext) -> Result<()> {
        match &self.after_agent {
            Some(callback) => callback(ctx),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for AgentCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCallbacks")
            .field("before_agent", &self.before_agent.is_some())
            .field("after_agent", &self.after_agent.is_some())
            .finish()
    }
}

/// State shared by every agent variant
pub struct AgentBase {
    name: String,
    description: String,
    sub_agents: Vec<Arc<dyn Agent>>,
    parent: RwLock<Option<Weak<dyn Agent>>>,
    callbacks: AgentCallbacks,
}

impl AgentBase {
    /// Create a base with the given name and no children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            sub_agents: Vec::new(),
            parent: RwLock::new(None),
            callbacks: AgentCallbacks::default(),
        }
    }

    // =========== Builder Methods ===========

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append one child
    pub fn with_sub_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.sub_agents.push(agent);
        self
    }

    /// Append several children, keeping their order
    pub fn with_sub_agents(mut self, agents: impl IntoIterator<Item = Arc<dyn Agent>>) -> Self {
        self.sub_agents.extend(agents);
        self
    }

    /// Register a hook run before any event is produced
    pub fn with_before_agent_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InvocationContext) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.before_agent = Some(Arc::new(callback));
        self
    }

    /// Register a hook run after the event stream is exhausted
    pub fn with_after_agent_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InvocationContext) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.after_agent = Some(Arc::new(callback));
        self
    }

    /// Fill the description only if none was given
    pub fn or_description(mut self, description: &str) -> Self {
        if self.description.is_empty() {
            self.description = description.to_string();
        }
        self
    }

    // =========== Accessors ===========

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.sub_agents
    }

    pub fn callbacks(&self) -> &AgentCallbacks {
        &self.callbacks
    }

    /// Direct child with the given name
    pub fn find_sub_agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.sub_agents
            .iter()
            .find(|agent| agent.name() == name)
            .cloned()
    }

    /// Parent agent, if attached and still alive
    pub fn parent(&self) -> Option<Arc<dyn Agent>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Record the parent back-reference
    pub fn set_parent(&self, parent: Weak<dyn Agent>) {
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = Some(parent);
    }

    /// Check the name and the children before attaching them
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InitializationFailed(
                "Agent name must not be empty".to_string(),
            ));
        }
        if self.name == USER_AUTHOR {
            return Err(Error::InitializationFailed(format!(
                "Agent name '{USER_AUTHOR}' is reserved for user input"
            )));
        }

        let mut seen = HashSet::new();
        for child in &self.sub_agents {
            if !seen.insert(child.name()) {
                return Err(Error::InitializationFailed(format!(
                    "Agent '{}' has duplicate sub-agent name '{}'",
                    self.name,
                    child.name()
                )));
            }
            if let Some(parent) = child.parent_agent() {
                return Err(Error::InitializationFailed(format!(
                    "Agent '{}' already has parent '{}'; cannot attach it to '{}'",
                    child.name(),
                    parent.name(),
                    self.name
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AgentBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children: Vec<&str> = self.sub_agents.iter().map(|a| a.name()).collect();
        f.debug_struct("AgentBase")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("sub_agents", &children)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

/// Validate `base`, construct the agent and point every child at it
///
/// # Example
///
/// ```ignore
/// pub fn new(base: AgentBase) -> Result<Arc<Self>> {
///     build_agent(base, |base| Self { base })
/// }
/// ```
pub fn build_agent<A, F>(base: AgentBase, make: F) -> Result<Arc<A>>
where
    A: Agent + 'static,
    F: FnOnce(AgentBase) -> A,
{
    base.validate()?;
    Ok(Arc::new_cyclic(|weak: &Weak<A>| {
        let owner: Weak<dyn Agent> = weak.clone();
        for child in base.sub_agents() {
            child.set_parent_agent(owner.clone());
        }
        make(base)
    }))
}

/// Core trait that all agents must implement
///
/// An agent turns an [`InvocationContext`] into a lazy [`EventStream`].
/// Setup failures are returned as `Err` before any event exists; failures
/// after streaming has started simply end the stream.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Shared identity and hierarchy state
    fn base(&self) -> &AgentBase;

    /// Get the agent's name (unique among siblings)
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Get the agent's description
    fn description(&self) -> &str {
        self.base().description()
    }

    /// Run the agent and return its event stream
    async fn run_async(self: Arc<Self>, ctx: InvocationContext) -> Result<EventStream>;

    /// Bidirectional variant; defaults to [`Agent::run_async`]
    async fn run_live(self: Arc<Self>, ctx: InvocationContext) -> Result<EventStream> {
        self.run_async(ctx).await
    }

    /// Direct children, in order
    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        self.base().sub_agents()
    }

    /// Direct child with the given name
    fn find_sub_agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.base().find_sub_agent(name)
    }

    /// Parent agent, `None` for the root
    fn parent_agent(&self) -> Option<Arc<dyn Agent>> {
        self.base().parent()
    }

    /// Set the non-owning parent reference
    fn set_parent_agent(&self, parent: Weak<dyn Agent>) {
        self.base().set_parent(parent);
    }
}

/// Lookups over a whole agent tree
pub trait AgentTree {
    /// Pre-order search: self first, then each child's subtree in order
    fn find_agent(&self, name: &str) -> Option<Arc<dyn Agent>>;

    /// Walk parent references up to the agent with no parent
    fn root_agent(&self) -> Arc<dyn Agent>;
}

impl AgentTree for Arc<dyn Agent> {
    fn find_agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        if self.name() == name {
            return Some(Arc::clone(self));
        }
        self.sub_agents()
            .iter()
            .find_map(|child| child.find_agent(name))
    }

    fn root_agent(&self) -> Arc<dyn Agent> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent_agent() {
            current = parent;
        }
        current
    }
}
