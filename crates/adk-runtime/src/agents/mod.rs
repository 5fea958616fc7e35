//! Concrete agent implementations
//!
//! - [`LlmAgent`]: model-backed leaf agent with tool dispatch and hand-off
//!
//! The structural combinators live in `adk-workflow`.

pub mod llm;

pub use llm::{IncludeContents, LlmAgent, LlmAgentBuilder};
