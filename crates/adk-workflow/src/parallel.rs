//! Parallel workflow agent
//!
//! Every child runs on its own tokio task with its own branch context and
//! feeds a shared bounded relay. The combined stream interleaves children in
//! arrival order, keeps each child's own order, and closes only after every
//! task has been joined.

use adk_core::{
    Agent, AgentBase, EventStream, InvocationContext, Result, build_agent, event_channel,
    next_event,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs its children concurrently
///
/// A child that fails does not cancel its siblings. Dropping the output
/// stream cancels every branch still running.
pub struct ParallelAgent {
    base: AgentBase,
}

impl ParallelAgent {
    /// Create a parallel agent over the base's children
    pub fn new(base: AgentBase) -> Result<Arc<Self>> {
        build_agent(base.or_description("Parallel execution agent"), |base| Self {
            base,
        })
    }
}

#[async_trait]
impl Agent for ParallelAgent {
    fn base(&self) -> &AgentBase {
        &self.base
    }

    async fn run_async(self: Arc<Self>, ctx: InvocationContext) -> Result<EventStream> {
        let agent = self;
        let stream = async_stream::stream! {
            let name = agent.name().to_string();
            if let Err(e) = agent.base.callbacks().run_before(&ctx) {
                warn!(agent = %name, error = %e, "Before-agent callback failed");
                return;
            }

            let scope = ctx.for_branch(&name);
            let _branches_guard = scope.cancellation_token().clone().drop_guard();
            let (sender, mut merged) = event_channel(&scope);

            let mut handles = Vec::with_capacity(agent.sub_agents().len());
            for child in agent.sub_agents() {
                let child = Arc::clone(child);
                let branch = scope.for_branch(child.name());
                let sender = sender.clone();
                handles.push(tokio::spawn(async move {
                    let child_name = child.name().to_string();
                    debug!(agent = %child_name, branch = ?branch.branch(), "Branch started");
                    let mut events = match Arc::clone(&child).run_async(branch.clone()).await {
                        Ok(events) => events,
                        Err(e) => {
                            warn!(agent = %child_name, error = %e, "Branch failed to start");
                            return;
                        }
                    };
                    while let Some(event) = next_event(&mut events, &branch).await {
                        if !sender.send(event).await {
                            break;
                        }
                    }
                    debug!(agent = %child_name, "Branch finished");
                }));
            }
            drop(sender);

            while let Some(event) = next_event(&mut merged, &ctx).await {
                yield event;
            }

            if ctx.is_cancelled() {
                for handle in &handles {
                    handle.abort();
                }
                debug!(agent = %name, "Parallel run cancelled");
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(agent = %name, error = %e, "Branch task panicked");
                }
            }

            if let Err(e) = agent.base.callbacks().run_after(&ctx) {
                warn!(agent = %name, error = %e, "After-agent callback failed");
                return;
            }
            info!(agent = %name, branches = agent.sub_agents().len(), "Parallel run finished");
        };
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenAgent, ScriptAgent, as_agent, texts};
    use adk_core::{Event, Session, SessionKey};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn ctx() -> InvocationContext {
        InvocationContext::new(Arc::new(Session::new(SessionKey::new("app", "u", "s"))))
    }

    fn texts_by(events: &[Event], author: &str) -> Vec<String> {
        let own: Vec<Event> = events.iter().filter(|e| e.author == author).cloned().collect();
        texts(&own)
    }

    #[tokio::test]
    async fn test_all_events_arrive_with_per_child_order() {
        let fast = ScriptAgent::new("fast", &["f1", "f2", "f3"]);
        let slow = ScriptAgent::slow("slow", &["s1", "s2"], Duration::from_millis(5));
        let par: Arc<dyn Agent> = ParallelAgent::new(
            AgentBase::new("par").with_sub_agents([as_agent(&fast), as_agent(&slow)]),
        )
        .unwrap();

        let events: Vec<Event> = par.run_async(ctx()).await.unwrap().collect().await;

        assert_eq!(events.len(), 5);
        assert_eq!(texts_by(&events, "fast"), vec!["f1", "f2", "f3"]);
        assert_eq!(texts_by(&events, "slow"), vec!["s1", "s2"]);
        let ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn test_children_run_on_their_own_branch() {
        let par: Arc<dyn Agent> = ParallelAgent::new(AgentBase::new("par").with_sub_agents([
            as_agent(&ScriptAgent::new("a", &["a1"])),
            as_agent(&ScriptAgent::new("b", &["b1"])),
        ]))
        .unwrap();

        let events: Vec<Event> = par.run_async(ctx()).await.unwrap().collect().await;
        let branches: HashSet<String> = events.iter().filter_map(|e| e.branch.clone()).collect();
        assert_eq!(
            branches,
            HashSet::from(["par.a".to_string(), "par.b".to_string()])
        );
    }

    #[tokio::test]
    async fn test_failed_child_does_not_affect_siblings() {
        let par: Arc<dyn Agent> = ParallelAgent::new(AgentBase::new("par").with_sub_agents([
            as_agent(&BrokenAgent::new("broken")),
            as_agent(&ScriptAgent::slow("ok", &["o1", "o2"], Duration::from_millis(1))),
        ]))
        .unwrap();

        let events: Vec<Event> = par.run_async(ctx()).await.unwrap().collect().await;
        assert_eq!(texts(&events), vec!["o1", "o2"]);
    }

    #[tokio::test]
    async fn test_after_callback_runs_once_all_branches_closed() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let slow = ScriptAgent::slow("slow", &["s1"], Duration::from_millis(20));
        let par: Arc<dyn Agent> = ParallelAgent::new(
            AgentBase::new("par")
                .with_sub_agents([as_agent(&ScriptAgent::new("fast", &["f1"])), as_agent(&slow)])
                .with_after_agent_callback(move |_| {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .unwrap();

        let mut events = par.run_async(ctx()).await.unwrap();
        let mut seen = 0;
        while let Some(_event) = events.next().await {
            seen += 1;
            assert!(!finished.load(Ordering::SeqCst));
        }
        assert_eq!(seen, 2);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancellation_closes_stream() {
        let slow = ScriptAgent::slow("slow", &["s1", "s2", "s3"], Duration::from_millis(50));
        let par: Arc<dyn Agent> =
            ParallelAgent::new(AgentBase::new("par").with_sub_agent(as_agent(&slow))).unwrap();

        let ctx = ctx();
        let events = par.run_async(ctx.clone()).await.unwrap();
        ctx.cancel();
        let remaining: Vec<Event> = tokio::time::timeout(Duration::from_secs(1), events.collect())
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_empty_parallel_finishes() {
        let par: Arc<dyn Agent> = ParallelAgent::new(AgentBase::new("par")).unwrap();
        let events: Vec<Event> = par.run_async(ctx()).await.unwrap().collect().await;
        assert!(events.is_empty());
    }
}
