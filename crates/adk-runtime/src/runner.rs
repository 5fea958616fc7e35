//! Runner for executing a root agent against a session store
//!
//! The [`Runner`] owns one invocation end to end: it resolves or creates the
//! session, records the inbound user message, starts the root agent and
//! relays every event it produces, persisting each one before the caller
//! sees it.

use adk_core::{
    Agent, ArtifactService, Content, Error, Event, EventStream, InMemoryArtifactService,
    InMemoryMemoryService, InMemorySessionService, InvocationContext, MemoryService, Result,
    Session, SessionKey, SessionService, USER_AUTHOR, next_event,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What the runner does when the store rejects an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Log, cancel the invocation and end the stream without forwarding the event
    #[default]
    Halt,
    /// Log and forward the event anyway
    BestEffort,
}

/// Configuration for the runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Application name used to key sessions
    pub app_name: String,

    /// Handling of failed appends
    pub persistence_policy: PersistencePolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            app_name: "adk-rs".to_string(),
            persistence_policy: PersistencePolicy::Halt,
        }
    }
}

/// Drives a root agent for one application
///
/// # Example
///
/// ```no_run
/// use adk_core::{Agent, Content};
/// use adk_runtime::Runner;
/// use std::sync::Arc;
///
/// # async fn example(agent: Arc<dyn Agent>) -> adk_core::Result<()> {
/// let runner = Runner::in_memory("weather", agent);
/// let last = runner
///     .run("alice", "s1", Some(Content::user("Will it rain?")))
///     .await?;
/// println!("{:?}", last.and_then(|event| event.text().map(str::to_string)));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Runner {
    config: RunnerConfig,
    root_agent: Arc<dyn Agent>,
    session_service: Arc<dyn SessionService>,
    memory_service: Arc<dyn MemoryService>,
    artifact_service: Arc<dyn ArtifactService>,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("root_agent", &self.root_agent.name())
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Create a runner with the default persistence policy
    ///
    /// Memory and artifacts are kept in process; use [`Runner::builder`] to
    /// plug in other stores.
    pub fn new(
        app_name: impl Into<String>,
        root_agent: Arc<dyn Agent>,
        session_service: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            config: RunnerConfig {
                app_name: app_name.into(),
                ..RunnerConfig::default()
            },
            root_agent,
            session_service,
            memory_service: Arc::new(InMemoryMemoryService::new()),
            artifact_service: Arc::new(InMemoryArtifactService::new()),
        }
    }

    /// Create a runner backed by a fresh in-memory session store
    pub fn in_memory(app_name: impl Into<String>, root_agent: Arc<dyn Agent>) -> Self {
        Self::new(app_name, root_agent, Arc::new(InMemorySessionService::new()))
    }

    /// Create a new runner builder
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn root_agent(&self) -> &Arc<dyn Agent> {
        &self.root_agent
    }

    pub fn session_service(&self) -> &Arc<dyn SessionService> {
        &self.session_service
    }

    pub fn memory_service(&self) -> &Arc<dyn MemoryService> {
        &self.memory_service
    }

    pub fn artifact_service(&self) -> &Arc<dyn ArtifactService> {
        &self.artifact_service
    }

    fn session_key(&self, user_id: &str, session_id: &str) -> Result<SessionKey> {
        if user_id.is_empty() {
            return Err(Error::InitializationFailed(
                "User id must not be empty".to_string(),
            ));
        }
        if session_id.is_empty() {
            return Err(Error::InitializationFailed(
                "Session id must not be empty".to_string(),
            ));
        }
        Ok(SessionKey::new(self.config.app_name.clone(), user_id, session_id))
    }

    /// Fetch the session, creating it with empty state if absent
    ///
    /// A concurrent creator winning the race is not an error; its session
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailed`] for an empty user or session
    /// id, or the store's error.
    pub async fn get_or_create_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Arc<Session>> {
        let key = self.session_key(user_id, session_id)?;
        if let Some(session) = self.session_service.get_session(&key).await? {
            return Ok(session);
        }

        debug!(session_id = %session_id, user_id = %user_id, "Creating session");
        match self
            .session_service
            .create_session(&key.app_name, user_id, Some(session_id), None)
            .await
        {
            Ok(session) => Ok(session),
            Err(Error::SessionAlreadyExists(_)) => self
                .session_service
                .get_session(&key)
                .await?
                .ok_or_else(|| Error::SessionNotFound(key.to_string())),
            Err(e) => Err(e),
        }
    }

    fn invocation_context(
        &self,
        session: Arc<Session>,
        new_message: Option<Content>,
        cancellation: CancellationToken,
    ) -> InvocationContext {
        InvocationContext::new(session)
            .with_user_content(new_message)
            .with_cancellation(cancellation)
            .with_memory_service(Arc::clone(&self.memory_service))
            .with_artifact_service(Arc::clone(&self.artifact_service))
    }

    /// Run one invocation and return the relayed event stream
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be resolved, the user message
    /// cannot be persisted, or the root agent fails to start.
    pub async fn run_async(
        &self,
        user_id: &str,
        session_id: &str,
        new_message: Option<Content>,
    ) -> Result<EventStream> {
        self.run_async_with_cancellation(user_id, session_id, new_message, CancellationToken::new())
            .await
    }

    /// Like [`Runner::run_async`], stopping when `cancellation` fires
    pub async fn run_async_with_cancellation(
        &self,
        user_id: &str,
        session_id: &str,
        new_message: Option<Content>,
        cancellation: CancellationToken,
    ) -> Result<EventStream> {
        let session = self.get_or_create_session(user_id, session_id).await?;
        let ctx = self.invocation_context(
            Arc::clone(&session),
            new_message.clone(),
            cancellation.child_token(),
        );
        info!(
            agent = %self.root_agent.name(),
            invocation_id = %ctx.invocation_id(),
            session_id = %session_id,
            "Starting invocation"
        );

        let user_event = match new_message {
            Some(message) => {
                let event = Event::new(USER_AUTHOR)
                    .with_invocation_id(ctx.invocation_id())
                    .with_content(message);
                self.session_service
                    .append_event(session.key(), event.clone())
                    .await?;
                Some(event)
            }
            None => None,
        };

        let events = Arc::clone(&self.root_agent).run_async(ctx.clone()).await?;
        Ok(self.relay(ctx, user_event, events))
    }

    /// Bidirectional entry point; no user event is synthesized
    pub async fn run_live(&self, user_id: &str, session_id: &str) -> Result<EventStream> {
        let session = self.get_or_create_session(user_id, session_id).await?;
        let ctx = self.invocation_context(session, None, CancellationToken::new());
        info!(
            agent = %self.root_agent.name(),
            invocation_id = %ctx.invocation_id(),
            session_id = %session_id,
            "Starting live invocation"
        );
        let events = Arc::clone(&self.root_agent).run_live(ctx.clone()).await?;
        Ok(self.relay(ctx, None, events))
    }

    /// Run to completion and return the last event
    pub async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        new_message: Option<Content>,
    ) -> Result<Option<Event>> {
        let mut events = self.run_async(user_id, session_id, new_message).await?;
        let mut last = None;
        while let Some(event) = events.next().await {
            last = Some(event);
        }
        Ok(last)
    }

    /// Hand session finalization to the store
    pub async fn close_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let key = self.session_key(user_id, session_id)?;
        self.session_service.close_session(&key).await
    }

    /// Persist each agent event, then forward it
    fn relay(
        &self,
        ctx: InvocationContext,
        user_event: Option<Event>,
        mut events: EventStream,
    ) -> EventStream {
        let session_service = Arc::clone(&self.session_service);
        let policy = self.config.persistence_policy;

        let stream = async_stream::stream! {
            let key = ctx.session().key().clone();
            if let Some(event) = user_event {
                yield event;
            }

            let mut relayed = 0usize;
            while let Some(event) = next_event(&mut events, &ctx).await {
                match session_service.append_event(&key, event.clone()).await {
                    Ok(()) => {
                        debug!(event_id = %event.id, author = %event.author, "Event persisted");
                    }
                    Err(e) => match policy {
                        PersistencePolicy::Halt => {
                            error!(
                                event_id = %event.id,
                                session_id = %key.session_id,
                                error = %e,
                                "Failed to persist event, stopping invocation"
                            );
                            ctx.cancel();
                            return;
                        }
                        PersistencePolicy::BestEffort => {
                            warn!(
                                event_id = %event.id,
                                session_id = %key.session_id,
                                error = %e,
                                "Failed to persist event, forwarding anyway"
                            );
                        }
                    },
                }
                relayed += 1;
                yield event;
            }

            info!(
                invocation_id = %ctx.invocation_id(),
                event_count = relayed,
                cancelled = ctx.is_cancelled(),
                "Invocation finished"
            );
        };
        stream.boxed()
    }
}

/// Builder for [`Runner`]
pub struct RunnerBuilder {
    config: RunnerConfig,
    root_agent: Option<Arc<dyn Agent>>,
    session_service: Option<Arc<dyn SessionService>>,
    memory_service: Option<Arc<dyn MemoryService>>,
    artifact_service: Option<Arc<dyn ArtifactService>>,
}

impl RunnerBuilder {
    /// Create a new runner builder
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
            root_agent: None,
            session_service: None,
            memory_service: None,
            artifact_service: None,
        }
    }

    /// Take the application name from the shared configuration
    pub fn config(mut self, config: &adk_utils::Config) -> Self {
        self.config.app_name.clone_from(&config.app_name);
        self
    }

    /// Set the runner configuration
    pub fn runner_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the application name
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.config.app_name = app_name.into();
        self
    }

    /// Set the persistence policy
    pub fn persistence_policy(mut self, policy: PersistencePolicy) -> Self {
        self.config.persistence_policy = policy;
        self
    }

    /// Set the root agent
    pub fn root_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.root_agent = Some(agent);
        self
    }

    /// Set the session store
    pub fn session_service(mut self, service: Arc<dyn SessionService>) -> Self {
        self.session_service = Some(service);
        self
    }

    /// Set the memory service handed to tools
    pub fn memory_service(mut self, service: Arc<dyn MemoryService>) -> Self {
        self.memory_service = Some(service);
        self
    }

    /// Set the artifact service handed to tools
    pub fn artifact_service(mut self, service: Arc<dyn ArtifactService>) -> Self {
        self.artifact_service = Some(service);
        self
    }

    /// Build the runner
    ///
    /// # Errors
    ///
    /// Returns an error if the root agent is not set or the app name is empty
    pub fn build(self) -> Result<Runner> {
        let root_agent = self
            .root_agent
            .ok_or_else(|| Error::InitializationFailed("Root agent not set".to_string()))?;
        if self.config.app_name.is_empty() {
            return Err(Error::InitializationFailed(
                "App name must not be empty".to_string(),
            ));
        }

        let session_service = self
            .session_service
            .unwrap_or_else(|| Arc::new(InMemorySessionService::new()));

        Ok(Runner {
            config: self.config,
            root_agent,
            session_service,
            memory_service: self
                .memory_service
                .unwrap_or_else(|| Arc::new(InMemoryMemoryService::new())),
            artifact_service: self
                .artifact_service
                .unwrap_or_else(|| Arc::new(InMemoryArtifactService::new())),
        })
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adk_core::{AgentBase, ArtifactKey, StateMap, build_agent};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    /// Emits one final text event per configured reply
    struct ReplyAgent {
        base: AgentBase,
        replies: Vec<&'static str>,
    }

    impl ReplyAgent {
        fn new(name: &str, replies: Vec<&'static str>) -> Arc<dyn Agent> {
            build_agent(AgentBase::new(name), |base| Self { base, replies }).unwrap()
        }
    }

    #[async_trait]
    impl Agent for ReplyAgent {
        fn base(&self) -> &AgentBase {
            &self.base
        }

        async fn run_async(self: Arc<Self>, ctx: InvocationContext) -> Result<EventStream> {
            let events: Vec<Event> = self
                .replies
                .iter()
                .map(|text| {
                    Event::new(self.name())
                        .with_invocation_id(ctx.invocation_id())
                        .with_content(Content::model(*text))
                        .final_response()
                })
                .collect();
            Ok(futures::stream::iter(events).boxed())
        }
    }

    struct FailingStartAgent {
        base: AgentBase,
    }

    #[async_trait]
    impl Agent for FailingStartAgent {
        fn base(&self) -> &AgentBase {
            &self.base
        }

        async fn run_async(self: Arc<Self>, _ctx: InvocationContext) -> Result<EventStream> {
            Err(Error::ProcessingFailed("cannot start".to_string()))
        }
    }

    /// In-memory store that rejects appends after a budget is spent
    struct FlakyStore {
        inner: InMemorySessionService,
        appends_left: AtomicUsize,
    }

    impl FlakyStore {
        fn new(appends: usize) -> Self {
            Self {
                inner: InMemorySessionService::new(),
                appends_left: AtomicUsize::new(appends),
            }
        }
    }

    #[async_trait]
    impl SessionService for FlakyStore {
        async fn create_session(
            &self,
            app_name: &str,
            user_id: &str,
            session_id: Option<&str>,
            initial_state: Option<StateMap>,
        ) -> Result<Arc<Session>> {
            self.inner
                .create_session(app_name, user_id, session_id, initial_state)
                .await
        }

        async fn get_session(&self, key: &SessionKey) -> Result<Option<Arc<Session>>> {
            self.inner.get_session(key).await
        }

        async fn delete_session(&self, key: &SessionKey) -> Result<()> {
            self.inner.delete_session(key).await
        }

        async fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<Arc<Session>>> {
            self.inner.list_sessions(app_name, user_id).await
        }

        async fn append_event(&self, key: &SessionKey, event: Event) -> Result<()> {
            let remaining = self.appends_left.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(Error::Storage("disk full".to_string()));
            }
            self.appends_left.store(remaining - 1, Ordering::SeqCst);
            self.inner.append_event(key, event).await
        }

        async fn list_events(&self, key: &SessionKey) -> Result<Vec<Event>> {
            self.inner.list_events(key).await
        }
    }

    #[tokio::test]
    async fn test_user_event_comes_first_and_everything_is_persisted() {
        let store = Arc::new(InMemorySessionService::new());
        let runner = Runner::new("app", ReplyAgent::new("bot", vec!["one", "two"]), store.clone());

        let events: Vec<Event> = runner
            .run_async("alice", "s1", Some(Content::user("hi")))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].author, USER_AUTHOR);
        assert_eq!(events[0].content, Some(Content::user("hi")));
        assert_eq!(events[1].invocation_id, events[0].invocation_id);

        let persisted = store
            .list_events(&SessionKey::new("app", "alice", "s1"))
            .await
            .unwrap();
        assert_eq!(persisted, events);
    }

    #[tokio::test]
    async fn test_session_is_reused_across_runs() {
        let store = Arc::new(InMemorySessionService::new());
        let runner = Runner::new("app", ReplyAgent::new("bot", vec!["ok"]), store.clone());

        runner.run("alice", "s1", Some(Content::user("a"))).await.unwrap();
        let last = runner.run("alice", "s1", Some(Content::user("b"))).await.unwrap();

        assert_eq!(last.and_then(|e| e.text().map(str::to_string)).as_deref(), Some("ok"));
        assert_eq!(store.len().await, 1);
        let key = SessionKey::new("app", "alice", "s1");
        assert_eq!(store.list_events(&key).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_without_message_no_user_event() {
        let runner = Runner::in_memory("app", ReplyAgent::new("bot", vec!["hello"]));
        let events: Vec<Event> = runner.run_async("u", "s", None).await.unwrap().collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].author, "bot");

        let live: Vec<Event> = runner.run_live("u", "s").await.unwrap().collect().await;
        assert_eq!(live.len(), 1);
        assert_eq!(
            runner
                .session_service()
                .list_events(&SessionKey::new("app", "u", "s"))
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_root_agent_start_failure_is_surfaced() {
        let agent: Arc<dyn Agent> =
            build_agent(AgentBase::new("broken"), |base| FailingStartAgent { base }).unwrap();
        let runner = Runner::in_memory("app", agent);
        let Err(err) = runner.run_async("u", "s", Some(Content::user("hi"))).await else {
            panic!("a root agent that cannot start must fail the run");
        };
        assert!(matches!(err, Error::ProcessingFailed(_)));
    }

    #[tokio::test]
    async fn test_halt_policy_never_forwards_unpersisted_events() {
        // User event and first reply fit; the second reply is rejected
        let store = Arc::new(FlakyStore::new(2));
        let runner = Runner::new(
            "app",
            ReplyAgent::new("bot", vec!["one", "two", "three"]),
            store.clone(),
        );

        let events: Vec<Event> = runner
            .run_async("u", "s", Some(Content::user("hi")))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        let persisted = store
            .list_events(&SessionKey::new("app", "u", "s"))
            .await
            .unwrap();
        assert_eq!(persisted, events);
    }

    #[tokio::test]
    async fn test_best_effort_policy_forwards_everything() {
        let store = Arc::new(FlakyStore::new(1));
        let runner = Runner::builder()
            .app_name("app")
            .root_agent(ReplyAgent::new("bot", vec!["one", "two"]))
            .session_service(store.clone())
            .persistence_policy(PersistencePolicy::BestEffort)
            .build()
            .unwrap();

        let events: Vec<Event> = runner
            .run_async("u", "s", Some(Content::user("hi")))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            store
                .list_events(&SessionKey::new("app", "u", "s"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_user_event_persist_failure_is_a_setup_error() {
        let runner = Runner::new("app", ReplyAgent::new("bot", vec!["one"]), Arc::new(FlakyStore::new(0)));
        let Err(err) = runner.run_async("u", "s", Some(Content::user("hi"))).await else {
            panic!("an unpersisted user message must fail the run");
        };
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_cancelled_token_ends_stream() {
        let runner = Runner::in_memory("app", ReplyAgent::new("bot", vec!["one", "two"]));
        let token = CancellationToken::new();
        token.cancel();

        let events: Vec<Event> = runner
            .run_async_with_cancellation("u", "s", Some(Content::user("hi")), token)
            .await
            .unwrap()
            .collect()
            .await;
        // The user event was persisted before the agent started
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].author, USER_AUTHOR);
    }

    #[test]
    fn test_builder() {
        assert_err!(Runner::builder().build());
        assert_err!(
            Runner::builder()
                .app_name("")
                .root_agent(ReplyAgent::new("bot", vec![]))
                .build()
        );

        let config = adk_utils::Config {
            app_name: "support-desk".to_string(),
            ..adk_utils::Config::default()
        };
        let runner = assert_ok!(
            Runner::builder()
                .config(&config)
                .root_agent(ReplyAgent::new("bot", vec![]))
                .build()
        );
        assert_eq!(runner.app_name(), "support-desk");
        assert_eq!(runner.config().persistence_policy, PersistencePolicy::Halt);
    }

    #[tokio::test]
    async fn test_empty_ids_are_rejected_before_touching_the_store() {
        let store = Arc::new(InMemorySessionService::new());
        let runner = Runner::new("app", ReplyAgent::new("bot", vec!["one"]), store.clone());

        let Err(err) = runner.run_async("u", "", Some(Content::user("hi"))).await else {
            panic!("an empty session id must be rejected");
        };
        assert!(matches!(err, Error::InitializationFailed(_)));
        assert!(runner.run_async("", "s", None).await.is_err());
        assert!(runner.run_live("u", "").await.is_err());

        assert_eq!(store.len().await, 0);
        assert!(store.list_sessions("app", "u").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_services_reach_tools() {
        let runner = Runner::in_memory("app", ReplyAgent::new("bot", vec![]));
        let session = runner.get_or_create_session("u", "s").await.unwrap();
        let ctx = runner.invocation_context(session, None, CancellationToken::new());
        assert!(ctx.memory_service().is_some());
        assert!(ctx.artifact_service().is_some());

        let built = Runner::builder()
            .root_agent(ReplyAgent::new("bot", vec![]))
            .build()
            .unwrap();
        let key = ArtifactKey::new(SessionKey::new("adk-rs", "u", "s"), "notes.txt");
        assert_eq!(
            built
                .artifact_service()
                .save_artifact(&key, b"hi".to_vec(), None)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_close_session_delegates_to_store() {
        let runner = Runner::in_memory("app", ReplyAgent::new("bot", vec![]));
        assert_ok!(runner.close_session("u", "missing").await);
    }
}
