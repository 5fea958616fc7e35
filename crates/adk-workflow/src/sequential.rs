//! Sequential workflow agent

use adk_core::{Agent, AgentBase, EventStream, InvocationContext, Result, build_agent, next_event};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs its children one after another
///
/// The output is each child's full stream, in child order. A child that
/// fails to start or ends early does not stop the sequence. The agent's own
/// callbacks bracket the whole sequence.
///
/// # Example
///
/// ```no_run
/// use adk_core::{Agent, AgentBase};
/// use adk_workflow::SequentialAgent;
/// use std::sync::Arc;
///
/// # fn example(research: Arc<dyn Agent>, write: Arc<dyn Agent>) -> adk_core::Result<()> {
/// let pipeline = SequentialAgent::new(
///     AgentBase::new("pipeline").with_sub_agents([research, write]),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct SequentialAgent {
    base: AgentBase,
}

impl SequentialAgent {
    /// Create a sequential agent over the base's children
    pub fn new(base: AgentBase) -> Result<Arc<Self>> {
        build_agent(base.or_description("Sequential execution agent"), |base| {
            Self { base }
        })
    }
}

/// Start a child, treating a start failure as an empty run
pub(crate) async fn start_child(
    child: &Arc<dyn Agent>,
    ctx: &InvocationContext,
) -> Option<EventStream> {
    debug!(agent = %child.name(), "Starting child agent");
    match Arc::clone(child).run_async(ctx.clone()).await {
        Ok(events) => Some(events),
        Err(e) => {
            warn!(agent = %child.name(), error = %e, "Child agent failed to start");
            None
        }
    }
}

#[async_trait]
impl Agent for SequentialAgent {
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

            for child in agent.sub_agents() {
                if ctx.is_cancelled() {
                    return;
                }
                let Some(mut events) = start_child(child, &ctx).await else {
                    continue;
                };
                while let Some(event) = next_event(&mut events, &ctx).await {
                    yield event;
                }
            }

            if ctx.is_cancelled() {
                debug!(agent = %name, "Sequence cancelled");
                return;
            }
            if let Err(e) = agent.base.callbacks().run_after(&ctx) {
                warn!(agent = %name, error = %e, "After-agent callback failed");
                return;
            }
            info!(agent = %name, children = agent.sub_agents().len(), "Sequence finished");
        };
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenAgent, ScriptAgent, as_agent, texts};
    use adk_core::{Error, Event, Session, SessionKey};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> InvocationContext {
        InvocationContext::new(Arc::new(Session::new(SessionKey::new("app", "u", "s"))))
    }

    async fn run(agent: Arc<dyn Agent>, ctx: InvocationContext) -> Vec<Event> {
        agent.run_async(ctx).await.unwrap().collect().await
    }

    #[tokio::test]
    async fn test_output_is_concatenation_in_child_order() {
        let a = ScriptAgent::new("a", &["a1", "a2"]);
        let b = ScriptAgent::new("b", &["b1"]);
        let c = ScriptAgent::new("c", &["c1", "c2"]);

        let seq = SequentialAgent::new(
            AgentBase::new("seq").with_sub_agents([as_agent(&a), as_agent(&b), as_agent(&c)]),
        )
        .unwrap();

        let events = run(seq, ctx()).await;
        assert_eq!(texts(&events), vec!["a1", "a2", "b1", "c1", "c2"]);
        assert_eq!(events[2].author, "b");
    }

    #[tokio::test]
    async fn test_failed_child_does_not_stop_sequence() {
        let seq = SequentialAgent::new(AgentBase::new("seq").with_sub_agents([
            as_agent(&ScriptAgent::new("a", &["a1"])),
            as_agent(&BrokenAgent::new("broken")),
            as_agent(&ScriptAgent::new("b", &["b1"])),
        ]))
        .unwrap();

        assert_eq!(texts(&run(seq, ctx()).await), vec!["a1", "b1"]);
    }

    #[tokio::test]
    async fn test_callbacks_bracket_the_whole_sequence() {
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let (b, a) = (Arc::clone(&before), Arc::clone(&after));

        let seq = SequentialAgent::new(
            AgentBase::new("seq")
                .with_sub_agents([
                    as_agent(&ScriptAgent::new("x", &["x1"])),
                    as_agent(&ScriptAgent::new("y", &["y1"])),
                ])
                .with_before_agent_callback(move |_| {
                    b.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .with_after_agent_callback(move |_| {
                    a.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .unwrap();

        assert_eq!(run(seq, ctx()).await.len(), 2);
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_before_callback_failure_runs_no_children() {
        let child = ScriptAgent::new("x", &["x1"]);
        let seq = SequentialAgent::new(
            AgentBase::new("seq")
                .with_sub_agent(as_agent(&child))
                .with_before_agent_callback(|_| Err(Error::Callback("denied".to_string()))),
        )
        .unwrap();

        assert!(run(seq, ctx()).await.is_empty());
        assert_eq!(child.runs(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_child() {
        let first = ScriptAgent::new("first", &["one"]);
        let second = ScriptAgent::new("second", &["two"]);
        let seq: Arc<dyn Agent> = SequentialAgent::new(
            AgentBase::new("seq").with_sub_agents([as_agent(&first), as_agent(&second)]),
        )
        .unwrap();

        let ctx = ctx();
        let mut events = seq.run_async(ctx.clone()).await.unwrap();
        assert!(events.next().await.is_some());
        ctx.cancel();
        assert!(events.next().await.is_none());
        assert_eq!(second.runs(), 0);
    }

    #[test]
    fn test_default_description() {
        let seq = SequentialAgent::new(AgentBase::new("seq")).unwrap();
        assert_eq!(seq.description(), "Sequential execution agent");
    }

    #[test]
    fn test_duplicate_child_names_rejected() {
        let built = SequentialAgent::new(AgentBase::new("seq").with_sub_agents([
            as_agent(&ScriptAgent::new("a", &["x"])),
            as_agent(&ScriptAgent::new("a", &["y"])),
        ]));
        let err = tokio_test::assert_err!(built.map(|_| ()));
        assert!(matches!(err, Error::InitializationFailed(_)));
    }
}
