//! LLM provider trait definition

use crate::{LlmRequest, Result};
use adk_core::Event;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy stream of generated events; an `Err` item ends the response
pub type LlmEventStream = BoxStream<'static, Result<Event>>;

/// Trait for inference backends
///
/// Implementations turn an [`LlmRequest`] into a lazy stream of events.
/// Setup problems are reported by `generate_content` itself; failures after
/// the first event are reported as an `Err` item.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Model identifier this handle serves
    fn model_name(&self) -> &str;

    /// Establish the connection; called once by the registry before first use
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Generate content for a request
    ///
    /// # Arguments
    ///
    /// * `request` - Assembled contents, generation config and tool declarations
    async fn generate_content(&self, request: LlmRequest) -> Result<LlmEventStream>;

    /// Model identifiers this backend family understands
    fn supported_models(&self) -> Vec<String> {
        Vec::new()
    }
}
