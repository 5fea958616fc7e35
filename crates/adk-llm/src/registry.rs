//! Injectable model registry
//!
//! Maps model identifiers to backend handles. Factories are registered by
//! identifier prefix (`"gemini"` serves `"gemini-2.0-flash"`); the first
//! resolution of an identifier creates the handle, connects it, and caches
//! it so every later resolution returns the same `Arc`.

use crate::{LLMError, LLMProvider, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

type InstanceCell = Arc<OnceCell<Arc<dyn LLMProvider>>>;

/// Creates a backend handle for a model identifier
pub type ProviderFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn LLMProvider>> + Send + Sync>;

/// Registry of backend factories and resolved handles
///
/// # Example
///
/// ```
/// use adk_llm::{LLMRegistry, ScriptedLLM};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let registry = LLMRegistry::new();
/// registry.register("scripted", |model| Ok(Arc::new(ScriptedLLM::new(model)) as _));
///
/// let a = registry.resolve("scripted-small").await.unwrap();
/// let b = registry.resolve("scripted-small").await.unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// # });
/// ```
#[derive(Default)]
pub struct LLMRegistry {
    factories: RwLock<Vec<(String, ProviderFactory)>>,
    // One cell per identifier; only that identifier's callers wait on its connect()
    instances: Mutex<HashMap<String, InstanceCell>>,
}

impl LLMRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for every identifier starting with `prefix`
    ///
    /// Re-registering a prefix replaces its factory. Already resolved
    /// handles stay cached.
    pub fn register<F>(&self, prefix: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Result<Arc<dyn LLMProvider>> + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        factories.retain(|(existing, _)| *existing != prefix);
        debug!(prefix = %prefix, "Registered model factory");
        factories.push((prefix, Arc::new(factory)));
    }

    /// Cache a ready handle under an exact identifier; it is not connected again
    pub fn register_instance(&self, model: impl Into<String>, handle: Arc<dyn LLMProvider>) {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.into(), Arc::new(OnceCell::new_with(Some(handle))));
    }

    /// Registered prefixes, in registration order
    pub fn registered_prefixes(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(prefix, _)| prefix.clone())
            .collect()
    }

    /// Whether a handle for `model` is already cached
    pub fn is_cached(&self, model: &str) -> bool {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .is_some_and(|cell| cell.initialized())
    }

    fn cell_for(&self, model: &str) -> InstanceCell {
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(instances.entry(model.to_string()).or_default())
    }

    fn factory_for(&self, model: &str) -> Option<ProviderFactory> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, factory)| Arc::clone(factory))
    }

    /// Resolve a model identifier to its handle
    ///
    /// The longest matching prefix wins. Fails with
    /// [`LLMError::ModelNotFound`] when nothing matches; a failed `connect`
    /// is returned as-is and nothing is cached.
    pub async fn resolve(&self, model: &str) -> Result<Arc<dyn LLMProvider>> {
        let cell = self.cell_for(model);
        let handle = cell
            .get_or_try_init(|| async {
                let factory = self
                    .factory_for(model)
                    .ok_or_else(|| LLMError::ModelNotFound(model.to_string()))?;
                let handle = factory(model)?;
                handle.connect().await?;
                info!(model = %model, "Resolved model");
                Ok::<_, LLMError>(handle)
            })
            .await?;
        Ok(Arc::clone(handle))
    }
}

impl fmt::Debug for LLMRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMRegistry")
            .field("prefixes", &self.registered_prefixes())
            .finish_non_exhaustive()
    }
}
