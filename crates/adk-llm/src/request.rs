//! Generation requests

use crate::ToolDeclaration;
use adk_core::Content;
use serde::{Deserialize, Serialize};

/// Sampling and length settings forwarded to the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl GenerateContentConfig {
    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of generated tokens
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Set nucleus sampling
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set top-k sampling
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set stop sequences
    pub fn with_stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.stop_sequences = sequences;
        self
    }
}

/// Request assembled by a leaf agent for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Model identifier
    pub model: String,
    /// Instruction plus (optionally) conversation history, in order
    pub contents: Vec<Content>,
    /// Generation settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<GenerateContentConfig>,
    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,
}

impl LlmRequest {
    /// Create a builder for generation requests
    pub fn builder(model: impl Into<String>) -> LlmRequestBuilder {
        LlmRequestBuilder::new(model)
    }

    /// Declared tool with the given name
    pub fn find_tool(&self, name: &str) -> Option<&ToolDeclaration> {
        self.tools.iter().find(|t| t.name == name)
    }
}

/// Builder for [`LlmRequest`]
#[derive(Debug, Clone)]
pub struct LlmRequestBuilder {
    model: String,
    contents: Vec<Content>,
    config: Option<GenerateContentConfig>,
    tools: Vec<ToolDeclaration>,
}

impl LlmRequestBuilder {
    /// Create a new builder
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            contents: Vec::new(),
            config: None,
            tools: Vec::new(),
        }
    }

    /// Append one content
    pub fn add_content(mut self, content: Content) -> Self {
        self.contents.push(content);
        self
    }

    /// Append several contents, keeping their order
    pub fn contents(mut self, contents: impl IntoIterator<Item = Content>) -> Self {
        self.contents.extend(contents);
        self
    }

    /// Set the generation settings
    pub fn config(mut self, config: Option<GenerateContentConfig>) -> Self {
        self.config = config;
        self
    }

    /// Append one tool declaration
    pub fn add_tool(mut self, tool: ToolDeclaration) -> Self {
        self.tools.push(tool);
        self
    }

    /// Append several tool declarations
    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolDeclaration>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Build the request
    pub fn build(self) -> LlmRequest {
        LlmRequest {
            model: self.model,
            contents: self.contents,
            config: self.config,
            tools: self.tools,
        }
    }
}
