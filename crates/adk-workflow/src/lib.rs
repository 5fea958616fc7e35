//! Workflow agents for adk-rs
//!
//! Structural combinators that compose child agents without calling a
//! model themselves:
//!
//! - [`SequentialAgent`]: children one after another
//! - [`ParallelAgent`]: children concurrently, events interleaved
//! - [`LoopAgent`]: repeated sequential passes until a cap or an exit signal

pub mod loop_agent;
pub mod parallel;
pub mod sequential;

#[cfg(test)]
mod testing;

// Re-export for convenience
pub use loop_agent::LoopAgent;
pub use parallel::ParallelAgent;
pub use sequential::SequentialAgent;
