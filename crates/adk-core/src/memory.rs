//! Long-term memory interface
//!
//! The in-memory implementation answers keyword queries over stored session
//! events. It is meant for tests and demos; it does no embedding search.

use crate::error::Result;
use crate::event::{Content, Part};
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One remembered piece of conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub content: Content,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of [`MemoryService::search_memory`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMemoryResponse {
    pub memories: Vec<MemoryEntry>,
}

/// Store and search conversation history across sessions
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Ingest every event with content from `session`
    async fn add_session_to_memory(&self, session: &Session) -> Result<()>;

    /// Find memories of one (app, user) pair relevant to `query`
    async fn search_memory(
        &self,
        app_name: &str,
        user_id: &str,
        query: &str,
    ) -> Result<SearchMemoryResponse>;
}

#[derive(Debug)]
struct IndexedEntry {
    entry: MemoryEntry,
    words: HashSet<String>,
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Keyword-matching memory kept in process
#[derive(Debug, Default)]
pub struct InMemoryMemoryService {
    // (app, user) -> session id -> entries
    entries: tokio::sync::RwLock<HashMap<(String, String), HashMap<String, Vec<IndexedEntry>>>>,
}

impl InMemoryMemoryService {
    /// Create an empty memory
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
    async fn add_session_to_memory(&self, session: &Session) -> Result<()> {
        let indexed: Vec<IndexedEntry> = session
            .events()
            .into_iter()
            .filter_map(|event| {
                let content = event.content?;
                let text: Vec<&str> = content.parts.iter().filter_map(Part::as_text).collect();
                if text.is_empty() {
                    return None;
                }
                Some(IndexedEntry {
                    words: words(&text.join(" ")),
                    entry: MemoryEntry {
                        content,
                        author: event.author,
                        timestamp: event.timestamp,
                    },
                })
            })
            .collect();

        debug!(
            session_id = %session.key(),
            entries = indexed.len(),
            "Added session to memory"
        );

        // Re-adding a session replaces its previous entries
        self.entries
            .write()
            .await
            .entry((session.app_name().to_string(), session.user_id().to_string()))
            .or_default()
            .insert(session.id().to_string(), indexed);
        Ok(())
    }

    async fn search_memory(
        &self,
        app_name: &str,
        user_id: &str,
        query: &str,
    ) -> Result<SearchMemoryResponse> {
        let query_words = words(query);
        if query_words.is_empty() {
            return Ok(SearchMemoryResponse::default());
        }

        let entries = self.entries.read().await;
        let Some(by_session) = entries.get(&(app_name.to_string(), user_id.to_string())) else {
            return Ok(SearchMemoryResponse::default());
        };

        let mut memories: Vec<MemoryEntry> = by_session
            .values()
            .flatten()
            .filter(|indexed| !indexed.words.is_disjoint(&query_words))
            .map(|indexed| indexed.entry.clone())
            .collect();
        memories.sort_by_key(|m| m.timestamp);

        Ok(SearchMemoryResponse { memories })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::session::SessionKey;

    fn session(user: &str, id: &str, texts: &[&str]) -> Session {
        let session = Session::new(SessionKey::new("app", user, id));
        for text in texts {
            session.add_event(Event::new("user").with_content(Content::user(*text)));
        }
        session.add_event(Event::new("agent"));
        session
    }

    #[tokio::test]
    async fn test_keyword_search() {
        let memory = InMemoryMemoryService::new();
        memory
            .add_session_to_memory(&session("alice", "s1", &["I like Rust", "Weather is nice"]))
            .await
            .unwrap();

        let found = memory.search_memory("app", "alice", "rust?").await.unwrap();
        assert_eq!(found.memories.len(), 1);
        assert_eq!(found.memories[0].content.text(), Some("I like Rust"));

        let none = memory.search_memory("app", "alice", "python").await.unwrap();
        assert!(none.memories.is_empty());
    }

    #[tokio::test]
    async fn test_search_is_scoped_to_user() {
        let memory = InMemoryMemoryService::new();
        memory
            .add_session_to_memory(&session("alice", "s1", &["rust"]))
            .await
            .unwrap();

        let found = memory.search_memory("app", "bob", "rust").await.unwrap();
        assert!(found.memories.is_empty());
    }

    #[tokio::test]
    async fn test_readding_session_replaces_entries() {
        let memory = InMemoryMemoryService::new();
        let s = session("alice", "s1", &["rust"]);
        memory.add_session_to_memory(&s).await.unwrap();
        memory.add_session_to_memory(&s).await.unwrap();

        let found = memory.search_memory("app", "alice", "rust").await.unwrap();
        assert_eq!(found.memories.len(), 1);
    }
}
