use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::package::Package;

/// Storage key of the single persisted catalogue blob.
pub const DEFAULT_SNAPSHOT_KEY: &str = "esim_catalogue_full";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot storage unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot payload could not be encoded: {0}")]
    Encode(String),
    #[error("snapshot payload could not be decoded: {0}")]
    Decode(String),
}

/// Serialized body of a catalogue snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub packages: Vec<Package>,
    #[serde(default)]
    pub country_names: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredSnapshot {
    pub payload: SnapshotPayload,
    pub updated_at: DateTime<Utc>,
}

/// Durable key → blob persistence for the full catalogue.
///
/// Implementations report failures; callers decide whether to degrade.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredSnapshot>, StorageError>;
    async fn save(&self, key: &str, payload: &SnapshotPayload) -> Result<(), StorageError>;
    /// Returns whether a snapshot existed under `key`.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Store used when persistence is disabled.
#[derive(Default)]
pub struct NoopSnapshotStore;

#[async_trait]
impl SnapshotStore for NoopSnapshotStore {
    async fn get(&self, _key: &str) -> Result<Option<StoredSnapshot>, StorageError> {
        Ok(None)
    }

    async fn save(&self, _key: &str, _payload: &SnapshotPayload) -> Result<(), StorageError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool, StorageError> {
        Ok(false)
    }
}

/// A restored catalogue is stale when any entry's first coverage value is
/// longer than an ISO code, i.e. it was written by the free-text format.
pub fn has_stale_coverage(packages: &[Package]) -> bool {
    packages
        .iter()
        .any(|package| package.coverage.first().is_some_and(|first| first.chars().count() > 3))
}
