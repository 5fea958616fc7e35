//! Invocation context
//!
//! The [`InvocationContext`] is the per-run bundle handed to every agent:
//! the current session, the branch label, the inbound user message, the
//! cancellation token and the optional memory/artifact services. It is cheap
//! to clone; clones share the session and services.

use crate::artifact::ArtifactService;
use crate::event::Content;
use crate::memory::MemoryService;
use crate::session::Session;
use crate::state::State;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Context passed to agents during one invocation
///
/// # Example
///
/// ```
/// use adk_core::{InvocationContext, Session, SessionKey};
/// use std::sync::Arc;
///
/// let session = Arc::new(Session::new(SessionKey::new("app", "alice", "s1")));
/// let ctx = InvocationContext::new(session).with_branch("root");
///
/// let child = ctx.for_branch("worker");
/// assert_eq!(child.branch(), Some("root.worker"));
/// assert_eq!(child.invocation_id(), ctx.invocation_id());
/// ```
#[derive(Clone)]
pub struct InvocationContext {
    invocation_id: String,
    session: Arc<Session>,
    branch: Option<String>,
    user_content: Option<Content>,
    cancellation: CancellationToken,
    memory_service: Option<Arc<dyn MemoryService>>,
    artifact_service: Option<Arc<dyn ArtifactService>>,
}

impl InvocationContext {
    /// Create a context with a fresh invocation id
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            invocation_id: format!("e-{}", Uuid::new_v4()),
            session,
            branch: None,
            user_content: None,
            cancellation: CancellationToken::new(),
            memory_service: None,
            artifact_service: None,
        }
    }

    // =========== Builder Methods ===========

    /// Set the invocation id
    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = invocation_id.into();
        self
    }

    /// Set the branch label
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Set the inbound user message
    pub fn with_user_content(mut self, content: Option<Content>) -> Self {
        self.user_content = content;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Attach a memory service
    pub fn with_memory_service(mut self, service: Arc<dyn MemoryService>) -> Self {
        self.memory_service = Some(service);
        self
    }

    /// Attach an artifact service
    pub fn with_artifact_service(mut self, service: Arc<dyn ArtifactService>) -> Self {
        self.artifact_service = Some(service);
        self
    }

    // =========== Accessors ===========

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Shorthand for `session().state()`
    pub fn state(&self) -> &State {
        self.session.state()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn user_content(&self) -> Option<&Content> {
        self.user_content.as_ref()
    }

    pub fn memory_service(&self) -> Option<&Arc<dyn MemoryService>> {
        self.memory_service.as_ref()
    }

    pub fn artifact_service(&self) -> Option<&Arc<dyn ArtifactService>> {
        self.artifact_service.as_ref()
    }

    // =========== Cancellation ===========

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Future that completes once the invocation is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// Cancel this invocation and every derived context
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Clone whose cancellation token is a child of this one
    ///
    /// Cancelling the child leaves the parent running.
    pub fn child(&self) -> Self {
        let mut child = self.clone();
        child.cancellation = self.cancellation.child_token();
        child
    }

    /// Child context running on branch `<current>.<name>` (or `<name>` at the top)
    pub fn for_branch(&self, name: &str) -> Self {
        let mut child = self.child();
        child.branch = Some(match &self.branch {
            Some(parent) => format!("{parent}.{name}"),
            None => name.to_string(),
        });
        child
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("invocation_id", &self.invocation_id)
            .field("session", self.session.key())
            .field("branch", &self.branch)
            .field("user_content", &self.user_content)
            .field("cancelled", &self.is_cancelled())
            .field("memory_service", &self.memory_service.is_some())
            .field("artifact_service", &self.artifact_service.is_some())
            .finish()
    }
}
