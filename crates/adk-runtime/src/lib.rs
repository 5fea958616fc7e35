//! Agent runtime for adk-rs
//!
//! This crate provides the pieces that actually execute an agent tree:
//! the model-backed [`LlmAgent`], the [`ToolDispatcher`] that runs the
//! function calls a model asks for, and the [`Runner`] that persists every
//! event to the session store before handing it to the caller.

pub mod agents;
pub mod callbacks;
pub mod executor;
pub mod runner;


// Re-export key types
pub use agents::{IncludeContents, LlmAgent, LlmAgentBuilder};
pub use callbacks::{AfterToolCallback, BeforeToolCallback, LlmCallbacks};
pub use executor::ToolDispatcher;
pub use runner::{PersistencePolicy, Runner, RunnerBuilder, RunnerConfig};
