//! Versioned artifact storage interface

use crate::error::{Error, Result};
use crate::session::SessionKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Identifies an artifact within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub session: SessionKey,
    pub filename: String,
}

impl ArtifactKey {
    /// Create an artifact key
    pub fn new(session: SessionKey, filename: impl Into<String>) -> Self {
        Self {
            session,
            filename: filename.into(),
        }
    }
}

/// One stored version of an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    /// 1-based version number
    pub version: u32,
    pub data: Vec<u8>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Save, load and list versioned binary artifacts
#[async_trait]
pub trait ArtifactService: Send + Sync {
    /// Store a new version and return its number (1 for the first save)
    async fn save_artifact(
        &self,
        key: &ArtifactKey,
        data: Vec<u8>,
        metadata: Option<Value>,
    ) -> Result<u32>;

    /// Load a specific version, or the latest when `version` is `None`
    async fn load_artifact(&self, key: &ArtifactKey, version: Option<u32>)
    -> Result<Option<Vec<u8>>>;

    /// Remove every version of an artifact
    async fn delete_artifact(&self, key: &ArtifactKey) -> Result<()>;

    /// Artifact filenames of a session, sorted
    async fn list_artifact_keys(&self, session: &SessionKey) -> Result<Vec<String>>;

    /// Version numbers of an artifact, ascending
    async fn list_versions(&self, key: &ArtifactKey) -> Result<Vec<u32>>;
}

/// Artifact store kept in process; every version is retained
#[derive(Debug, Default)]
pub struct InMemoryArtifactService {
    artifacts: tokio::sync::RwLock<HashMap<ArtifactKey, Vec<ArtifactVersion>>>,
}

impl InMemoryArtifactService {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Full record of one version, including metadata
    pub async fn get_version(&self, key: &ArtifactKey, version: u32) -> Option<ArtifactVersion> {
        self.artifacts
            .read()
            .await
            .get(key)?
            .iter()
            .find(|v| v.version == version)
            .cloned()
    }
}

#[async_trait]
impl ArtifactService for InMemoryArtifactService {
    async fn save_artifact(
        &self,
        key: &ArtifactKey,
        data: Vec<u8>,
        metadata: Option<Value>,
    ) -> Result<u32> {
        if key.filename.is_empty() {
            return Err(Error::Storage("Artifact filename must not be empty".to_string()));
        }
        let mut artifacts = self.artifacts.write().await;
        let versions = artifacts.entry(key.clone()).or_default();
        let version = versions.last().map_or(1, |v| v.version + 1);
        versions.push(ArtifactVersion {
            version,
            data,
            metadata,
            created_at: Utc::now(),
        });
        debug!(artifact = %key.filename, version, "Saved artifact");
        Ok(version)
    }

    async fn load_artifact(
        &self,
        key: &ArtifactKey,
        version: Option<u32>,
    ) -> Result<Option<Vec<u8>>> {
        let artifacts = self.artifacts.read().await;
        let Some(versions) = artifacts.get(key) else {
            return Ok(None);
        };
        let found = match version {
            Some(v) => versions.iter().find(|a| a.version == v),
            None => versions.last(),
        };
        Ok(found.map(|a| a.data.clone()))
    }

    async fn delete_artifact(&self, key: &ArtifactKey) -> Result<()> {
        self.artifacts.write().await.remove(key);
        Ok(())
    }

    async fn list_artifact_keys(&self, session: &SessionKey) -> Result<Vec<String>> {
        let artifacts = self.artifacts.read().await;
        let mut names: Vec<String> = artifacts
            .keys()
            .filter(|k| &k.session == session)
            .map(|k| k.filename.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn list_versions(&self, key: &ArtifactKey) -> Result<Vec<u32>> {
        Ok(self
            .artifacts
            .read()
            .await
            .get(key)
            .map(|versions| versions.iter().map(|v| v.version).collect())
            .unwrap_or_default())
    }
}
