//! Sessions
//!
//! A [`Session`] is the record of one (application, user, conversation)
//! triple: an append-only event log plus a [`State`].

use crate::event::Event;
use crate::state::{State, StateMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Store key identifying a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    /// Application name
    pub app_name: String,
    /// User id
    pub user_id: String,
    /// Session id, unique per (app, user)
    pub session_id: String,
}

impl SessionKey {
    /// Create a key from its three components
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Whether this key belongs to the given (app, user) pair
    ///
    /// Compares components exactly, so user `bob` never matches `bobby`.
    pub fn belongs_to(&self, app_name: &str, user_id: &str) -> bool {
        self.app_name == app_name && self.user_id == user_id
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.app_name, self.user_id, self.session_id)
    }
}

#[derive(Debug)]
struct SessionLog {
    events: Vec<Event>,
    last_update_time: DateTime<Utc>,
}

/// One conversation: ordered events plus mutable state
#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    state: State,
    log: RwLock<SessionLog>,
}

impl Session {
    /// Create an empty session
    pub fn new(key: SessionKey) -> Self {
        Self::with_state(key, StateMap::new())
    }

    /// Create a session seeded with initial state
    pub fn with_state(key: SessionKey, initial_state: StateMap) -> Self {
        Self {
            key,
            state: State::with_data(initial_state),
            log: RwLock::new(SessionLog {
                events: Vec::new(),
                last_update_time: Utc::now(),
            }),
        }
    }

    /// Store key
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Session id
    pub fn id(&self) -> &str {
        &self.key.session_id
    }

    /// Application name
    pub fn app_name(&self) -> &str {
        &self.key.app_name
    }

    /// User id
    pub fn user_id(&self) -> &str {
        &self.key.user_id
    }

    /// Session state
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Append an event; `last_update_time` never moves backwards
    pub fn add_event(&self, event: Event) {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now().max(event.timestamp);
        log.last_update_time = log.last_update_time.max(now);
        log.events.push(event);
    }

    /// Copy of the event log, in append order
    pub fn events(&self) -> Vec<Event> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }

    /// Number of events
    pub fn event_count(&self) -> usize {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    /// Time of the last append (creation time if none)
    pub fn last_update_time(&self) -> DateTime<Utc> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_update_time
    }

    /// Point-in-time copy suitable for serialization
    pub fn snapshot(&self) -> SessionSnapshot {
        let (events, last_update_time) = {
            let log = self.log.read().unwrap_or_else(PoisonError::into_inner);
            (log.events.clone(), log.last_update_time)
        };
        SessionSnapshot {
            key: self.key.clone(),
            state: self.state.snapshot(),
            events,
            last_update_time,
        }
    }
}

/// Serializable copy of a [`Session`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub key: SessionKey,
    pub state: StateMap,
    pub events: Vec<Event>,
    pub last_update_time: DateTime<Utc>,
}
