//! Scripted backend for tests and demos
//!
//! [`ScriptedLLM`] replays pre-recorded turns: each `generate_content` call
//! consumes the next turn. Once the script is exhausted it answers with a
//! single final text event.

use crate::{LLMError, LLMProvider, LlmEventStream, LlmRequest, Result};
use adk_core::{Content, Event, FunctionCall, Part, roles};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone)]
enum ScriptedTurn {
    Events(Vec<Event>),
    /// Emit the events, then fail mid-stream
    FailAfter(Vec<Event>, String),
}

/// Backend that replays a fixed script
#[derive(Debug)]
pub struct ScriptedLLM {
    model: String,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<LlmRequest>>,
    connects: AtomicUsize,
    fail_connect: bool,
    fail_generate: Option<String>,
}

impl ScriptedLLM {
    /// Create a backend with an empty script
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            fail_connect: false,
            fail_generate: None,
        }
    }

    // =========== Script Builders ===========

    /// Queue a turn producing exactly these events
    pub fn with_turn(self, events: Vec<Event>) -> Self {
        self.push(ScriptedTurn::Events(events))
    }

    /// Queue a turn producing one final text response
    pub fn with_text_turn(self, text: impl Into<String>) -> Self {
        let event = self.text_event(text);
        self.with_turn(vec![event])
    }

    /// Queue a turn whose only event requests a tool call
    pub fn with_function_call_turn(self, name: impl Into<String>, args: serde_json::Value) -> Self {
        let event = Event::new(self.model.clone()).with_content(
            Content::new(roles::MODEL).with_part(Part::FunctionCall(FunctionCall::new(name, args))),
        );
        self.with_turn(vec![event])
    }

    /// Queue a turn that emits `events` and then breaks off with an error
    pub fn with_failing_turn(self, events: Vec<Event>, message: impl Into<String>) -> Self {
        self.push(ScriptedTurn::FailAfter(events, message.into()))
    }

    /// Make `connect` fail
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make every `generate_content` call fail before streaming
    pub fn failing_generate(mut self, message: impl Into<String>) -> Self {
        self.fail_generate = Some(message.into());
        self
    }

    fn push(self, turn: ScriptedTurn) -> Self {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(turn);
        self
    }

    fn text_event(&self, text: impl Into<String>) -> Event {
        Event::new(self.model.clone())
            .with_content(Content::model(text))
            .final_response()
    }

    // =========== Inspection ===========

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `connect` calls
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Turns not yet consumed
    pub fn remaining_turns(&self) -> usize {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLLM {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(LLMError::ConfigurationError(format!(
                "Cannot connect to {}",
                self.model
            )));
        }
        Ok(())
    }

    async fn generate_content(&self, request: LlmRequest) -> Result<LlmEventStream> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(message) = &self.fail_generate {
            return Err(LLMError::RequestFailed(message.clone()));
        }

        let turn = self
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        let items: Vec<Result<Event>> = match turn {
            Some(ScriptedTurn::Events(events)) => events.into_iter().map(Ok).collect(),
            Some(ScriptedTurn::FailAfter(events, message)) => events
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(LLMError::StreamInterrupted(message))))
                .collect(),
            None => vec![Ok(self.text_event(format!("Response from {}", self.model)))],
        };
        Ok(futures::stream::iter(items).boxed())
    }

    fn supported_models(&self) -> Vec<String> {
        vec![self.model.clone()]
    }
}
