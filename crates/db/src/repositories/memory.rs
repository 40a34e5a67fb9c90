use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use roamcat_core::catalogue::snapshot::{
    SnapshotPayload, SnapshotStore, StorageError, StoredSnapshot,
};

/// Process-local snapshot store for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemorySnapshotRepository {
    snapshots: RwLock<HashMap<String, StoredSnapshot>>,
}

impl InMemorySnapshotRepository {
    pub async fn insert(&self, key: &str, snapshot: StoredSnapshot) {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(key.to_string(), snapshot);
    }
}

#[async_trait::async_trait]
impl SnapshotStore for InMemorySnapshotRepository {
    async fn get(&self, key: &str) -> Result<Option<StoredSnapshot>, StorageError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(key).cloned())
    }

    async fn save(&self, key: &str, payload: &SnapshotPayload) -> Result<(), StorageError> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(
            key.to_string(),
            StoredSnapshot { payload: payload.clone(), updated_at: Utc::now() },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut snapshots = self.snapshots.write().await;
        Ok(snapshots.remove(key).is_some())
    }
}
