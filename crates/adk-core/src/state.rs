//! Session state
//!
//! [`State`] is the mutable key/value scratchpad owned by a session. All
//! reads and writes go through one reader/writer lock, so a bulk
//! [`State::update`] is observed either entirely or not at all by concurrent
//! readers such as sibling agents in a parallel branch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Plain map form of a state
pub type StateMap = HashMap<String, Value>;

/// Well-known state keys
pub mod keys {
    /// When set to `true`, an enclosing loop agent stops before its next iteration
    pub const EXIT_LOOP: &str = "exit_loop";
}

/// Key/value state guarded by a single reader/writer lock
///
/// # Example
///
/// ```
/// use adk_core::State;
/// use serde_json::json;
///
/// let state = State::new();
/// state.update([("a".to_string(), json!(1)), ("b".to_string(), json!(2))]);
///
/// assert_eq!(state.get("a"), Some(json!(1)));
/// assert_eq!(state.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct State {
    data: RwLock<StateMap>,
}

impl State {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state seeded with initial values
    pub fn with_data(data: StateMap) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // still guards valid data.
    fn read(&self) -> RwLockReadGuard<'_, StateMap> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StateMap> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a copy of the value stored under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Get the value under `key` deserialized into `T`
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value).map_err(|e| {
                    crate::Error::ProcessingFailed(format!(
                        "Failed to deserialize state value '{key}': {e}"
                    ))
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// Read several keys under one lock acquisition
    ///
    /// The returned values are mutually consistent: no [`State::update`] can
    /// land between two of them.
    pub fn get_many(&self, keys: &[&str]) -> Vec<Option<Value>> {
        let data = self.read();
        keys.iter().map(|key| data.get(*key).cloned()).collect()
    }

    /// Set a single key
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.write().insert(key.into(), value);
    }

    /// Serialize `value` and store it under `key`
    pub fn set_typed<T: Serialize>(&self, key: impl Into<String>, value: &T) -> crate::Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.set(key, json_value);
        Ok(())
    }

    /// Apply every pair as one critical section
    pub fn update<I>(&self, values: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut data = self.write();
        data.extend(values);
    }

    /// Remove a key, returning its previous value
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().remove(key)
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the state has no keys
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the whole map
    pub fn snapshot(&self) -> StateMap {
        self.read().clone()
    }

    /// True when `key` holds JSON `true`
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }
}
