//! Tool management and execution framework for adk-rs
//!
//! This crate provides a framework for defining the tools (functions) leaf
//! agents call, the per-call [`ToolContext`] through which tools record side
//! effects, and the built-in control-flow tools.

pub mod builtin;
pub mod context;
pub mod function;
pub mod registry;
pub mod tool;

pub use builtin::{ExitLoopTool, TRANSFER_TOOL_PREFIX, TransferToAgentTool, TransferTool};
pub use context::ToolContext;
pub use function::{FunctionTool, ToolFn};
pub use registry::ToolRegistry;
pub use tool::Tool;
