//! Session store interface and the in-memory implementation

use crate::error::{Error, Result};
use crate::event::Event;
use crate::session::{Session, SessionKey};
use crate::state::StateMap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Persistent store of sessions and their event logs
///
/// `get_session` reports an absent session as `Ok(None)`; operations that
/// need an existing session fail with [`Error::SessionNotFound`].
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a session
    ///
    /// A missing or empty `session_id` is replaced with a generated one.
    /// Fails with [`Error::SessionAlreadyExists`] if the key is taken.
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<&str>,
        initial_state: Option<StateMap>,
    ) -> Result<Arc<Session>>;

    /// Look up a session
    async fn get_session(&self, key: &SessionKey) -> Result<Option<Arc<Session>>>;

    /// Delete a session; deleting an absent session is not an error
    async fn delete_session(&self, key: &SessionKey) -> Result<()>;

    /// Sessions of one (app, user) pair, ordered by session id
    async fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<Arc<Session>>>;

    /// Apply the event's state delta and append it to the session log
    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<()>;

    /// Events of a session, in append order
    async fn list_events(&self, key: &SessionKey) -> Result<Vec<Event>>;

    /// Finalize a session; volatile stores do nothing
    async fn close_session(&self, _key: &SessionKey) -> Result<()> {
        Ok(())
    }
}

/// In-memory session store for tests and local development
#[derive(Default)]
pub struct InMemorySessionService {
    sessions: tokio::sync::RwLock<HashMap<SessionKey, Arc<Session>>>,
}

impl InMemorySessionService {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn require(&self, key: &SessionKey) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<&str>,
        initial_state: Option<StateMap>,
    ) -> Result<Arc<Session>> {
        let session_id = match session_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let key = SessionKey::new(app_name, user_id, session_id);

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&key) {
            return Err(Error::SessionAlreadyExists(key.to_string()));
        }
        let session = Arc::new(Session::with_state(
            key.clone(),
            initial_state.unwrap_or_default(),
        ));
        sessions.insert(key.clone(), Arc::clone(&session));

        debug!(session_id = %key, "Created session");
        Ok(session)
    }

    async fn get_session(&self, key: &SessionKey) -> Result<Option<Arc<Session>>> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<()> {
        if self.sessions.write().await.remove(key).is_some() {
            debug!(session_id = %key, "Deleted session");
        }
        Ok(())
    }

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<Arc<Session>>> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<Arc<Session>> = sessions
            .iter()
            .filter(|(key, _)| key.belongs_to(app_name, user_id))
            .map(|(_, session)| Arc::clone(session))
            .collect();
        matching.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(matching)
    }

    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<()> {
        let session = self.require(key).await?;
        if !event.actions.state_delta.is_empty() {
            session.state().update(
                event
                    .actions
                    .state_delta
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        debug!(session_id = %key, event_id = %event.id, "Appended event");
        session.add_event(event);
        Ok(())
    }

    async fn list_events(&self, key: &SessionKey) -> Result<Vec<Event>> {
        Ok(self.require(key).await?.events())
    }
}
