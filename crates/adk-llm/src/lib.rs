//! Inference backend abstraction for adk-rs
//!
//! This crate defines how leaf agents talk to models without depending on
//! any concrete service:
//!
//! - Request types ([`LlmRequest`], [`GenerateContentConfig`])
//! - Tool declarations advertised to the model
//! - The [`LLMProvider`] trait backends implement
//! - An injectable [`LLMRegistry`] resolving model identifiers to cached handles
//! - [`ScriptedLLM`], a replaying backend for tests and demos

pub mod error;
pub mod mock;
pub mod provider;
pub mod registry;
pub mod request;
pub mod tools;

// Re-export main types
pub use error::{LLMError, Result};
pub use mock::ScriptedLLM;
pub use provider::{LLMProvider, LlmEventStream};
pub use registry::{LLMRegistry, ProviderFactory};
pub use request::{GenerateContentConfig, LlmRequest, LlmRequestBuilder};
pub use tools::ToolDeclaration;
