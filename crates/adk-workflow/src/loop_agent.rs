//! Loop workflow agent

use crate::sequential::start_child;
use adk_core::state::keys;
use adk_core::{Agent, AgentBase, EventStream, InvocationContext, Result, build_agent, next_event};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Repeats a sequential pass over its children
///
/// The loop ends when any of these happens:
///
/// - `max_iterations` passes have completed
/// - the session state holds `exit_loop: true` when a pass is about to start
/// - a forwarded event carries the `exit_loop` action; the rest of that
///   child's stream and all later children are abandoned
///
/// None of these is an error. A loop with `max_iterations == 0` runs no
/// children.
pub struct LoopAgent {
    base: AgentBase,
    max_iterations: usize,
}

impl LoopAgent {
    /// Create a loop agent over the base's children
    pub fn new(base: AgentBase, max_iterations: usize) -> Result<Arc<Self>> {
        build_agent(base.or_description("Loop execution agent"), |base| Self {
            base,
            max_iterations,
        })
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

#[async_trait]
impl Agent for LoopAgent {
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

            let mut completed = 0;
            'iterations: for iteration in 0..agent.max_iterations {
                if ctx.state().flag(keys::EXIT_LOOP) {
                    debug!(agent = %name, iteration, "Exit flag set in state");
                    break;
                }
                debug!(agent = %name, iteration, "Starting iteration");

                for child in agent.sub_agents() {
                    if ctx.is_cancelled() {
                        return;
                    }
                    let Some(mut events) = start_child(child, &ctx).await else {
                        continue;
                    };
                    while let Some(event) = next_event(&mut events, &ctx).await {
                        let exit = event.requests_loop_exit();
                        yield event;
                        if exit {
                            debug!(agent = %name, iteration, child = %child.name(), "Exit requested by event");
                            break 'iterations;
                        }
                    }
                }
                completed += 1;
            }

            if ctx.is_cancelled() {
                debug!(agent = %name, "Loop cancelled");
                return;
            }
            if let Err(e) = agent.base.callbacks().run_after(&ctx) {
                warn!(agent = %name, error = %e, "After-agent callback failed");
                return;
            }
            info!(agent = %name, iterations = completed, "Loop finished");
        };
        Ok(stream.boxed())
    }
}
