//! Small agents with fixed behavior for combinator tests

use adk_core::{
    Agent, AgentBase, Content, Error, Event, EventActions, EventStream, InvocationContext, Result,
    build_agent,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Emits one final text event per reply, optionally pausing before each
pub struct ScriptAgent {
    base: AgentBase,
    replies: Vec<String>,
    delay: Option<Duration>,
    exit_after: Option<usize>,
    runs: AtomicUsize,
}

impl ScriptAgent {
    pub fn new(name: &str, replies: &[&str]) -> Arc<Self> {
        Self::build(name, replies, None, None)
    }

    /// Pauses `delay` before every event
    pub fn slow(name: &str, replies: &[&str], delay: Duration) -> Arc<Self> {
        Self::build(name, replies, Some(delay), None)
    }

    /// Marks the reply at `index` with the loop-exit action
    pub fn exiting(name: &str, replies: &[&str], index: usize) -> Arc<Self> {
        Self::build(name, replies, None, Some(index))
    }

    fn build(
        name: &str,
        replies: &[&str],
        delay: Option<Duration>,
        exit_after: Option<usize>,
    ) -> Arc<Self> {
        build_agent(AgentBase::new(name), |base| Self {
            base,
            replies: replies.iter().map(|r| (*r).to_string()).collect(),
            delay,
            exit_after,
            runs: AtomicUsize::new(0),
        })
        .unwrap()
    }

    /// Number of `run_async` calls so far
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn run_async(self: Arc<Self>, ctx: InvocationContext) -> Result<EventStream> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let agent = self;
        let stream = async_stream::stream! {
            for (index, reply) in agent.replies.iter().enumerate() {
                if let Some(delay) = agent.delay {
                    tokio::time::sleep(delay).await;
                }
                let actions = EventActions {
                    exit_loop: agent.exit_after == Some(index),
                    ..EventActions::default()
                };
                yield Event::new(agent.name())
                    .with_invocation_id(ctx.invocation_id())
                    .with_branch(ctx.branch().map(str::to_string))
                    .with_content(Content::model(reply.clone()))
                    .with_actions(actions)
                    .final_response();
            }
        };
        Ok(stream.boxed())
    }
}

/// Fails before producing a stream
pub struct BrokenAgent {
    base: AgentBase,
}

impl BrokenAgent {
    pub fn new(name: &str) -> Arc<Self> {
        build_agent(AgentBase::new(name), |base| Self { base }).unwrap()
    }
}

#[async_trait]
impl Agent for BrokenAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn run_async(self: Arc<Self>, _ctx: InvocationContext) -> Result<EventStream> {
        Err(Error::ProcessingFailed(format!("{} is broken", self.name())))
    }
}

/// Text of every event, in order
pub fn texts(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| event.text().map(str::to_string))
        .collect()
}

pub fn as_agent<A: Agent + 'static>(agent: &Arc<A>) -> Arc<dyn Agent> {
    Arc::clone(agent) as Arc<dyn Agent>
}
