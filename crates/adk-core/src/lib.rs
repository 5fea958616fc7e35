//! Core abstractions for adk-rs
//!
//! This crate defines the types every other adk crate builds on: the event
//! model, sessions and their state, the session store interface, the
//! [`Agent`] trait with its shared hierarchy base, the per-run
//! [`InvocationContext`], and the event stream primitives.

pub mod agent;
pub mod artifact;
pub mod context;
pub mod error;
pub mod event;
pub mod memory;
pub mod session;
pub mod session_service;
pub mod state;
pub mod stream;

pub use agent::{Agent, AgentBase, AgentCallback, AgentCallbacks, AgentTree, build_agent};
pub use artifact::{ArtifactKey, ArtifactService, ArtifactVersion, InMemoryArtifactService};
pub use context::InvocationContext;
pub use error::{Error, Result};
pub use event::{
    Content, Event, EventActions, FunctionCall, FunctionResponse, Part, USER_AUTHOR, roles,
};
pub use memory::{InMemoryMemoryService, MemoryEntry, MemoryService, SearchMemoryResponse};
pub use session::{Session, SessionKey, SessionSnapshot};
pub use session_service::{InMemorySessionService, SessionService};
pub use state::{State, StateMap};
pub use stream::{EventSender, EventStream, empty_stream, event_channel, next_event};
