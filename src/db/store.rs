//! The snapshot store engine.
//!
//! Owns the connection pool behind an explicit readiness state. Every CRUD
//! operation checks the state first and never touches storage unless the
//! engine is `Ready`.

use super::migrations::{self, init_db};
use super::repo::Repository;
use crate::config::Config;
use crate::domain::{NewSnapshot, Snapshot, SnapshotId};
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Asynchronous CRUD contract shared by the engine and its test doubles.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Open the database and run pending schema setup.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Persist a new snapshot and return its generated id.
    async fn add_snapshot(&self, page: NewSnapshot) -> Result<SnapshotId, StoreError>;

    /// Every stored snapshot, in storage order.
    async fn get_all_snapshots(&self) -> Result<Vec<Snapshot>, StoreError>;

    /// Remove one snapshot. Absent ids succeed as a no-op.
    async fn delete_snapshot(&self, id: SnapshotId) -> Result<(), StoreError>;

    /// Remove every snapshot.
    async fn clear_all_snapshots(&self) -> Result<(), StoreError>;
}

/// Observable lifecycle of a [`SnapshotStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

enum EngineState {
    Uninitialized,
    Initializing,
    Ready(Repository),
    Failed(String),
}

/// Snapshot store bound to one database file.
pub struct SnapshotStore {
    database_path: String,
    max_connections: u32,
    state: RwLock<EngineState>,
    // Serializes initialize()/close(); never held by CRUD operations.
    lifecycle: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(database_path: impl Into<String>, max_connections: u32) -> Self {
        Self {
            database_path: database_path.into(),
            max_connections,
            state: RwLock::new(EngineState::Uninitialized),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.database_path.clone(), config.max_connections)
    }

    pub fn database_path(&self) -> &str {
        &self.database_path
    }

    pub fn status(&self) -> EngineStatus {
        match &*self.read_state() {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Initializing => EngineStatus::Initializing,
            EngineState::Ready(_) => EngineStatus::Ready,
            EngineState::Failed(_) => EngineStatus::Failed,
        }
    }

    /// Stored schema version of the open database.
    pub async fn schema_version(&self) -> Result<u32, StoreError> {
        let repo = self.repository()?;
        migrations::schema_version(repo.pool())
            .await
            .map_err(StoreError::read)
    }

    /// Close the pool and return to `Uninitialized`.
    ///
    /// A `Failed` engine stays failed.
    pub async fn close(&self) {
        let _guard = self.lifecycle.lock().await;
        let repo = {
            let mut state = self.write_state();
            match std::mem::replace(&mut *state, EngineState::Uninitialized) {
                EngineState::Ready(repo) => Some(repo),
                EngineState::Failed(reason) => {
                    *state = EngineState::Failed(reason);
                    None
                }
                EngineState::Uninitialized | EngineState::Initializing => None,
            }
        };

        if let Some(repo) = repo {
            repo.pool().close().await;
            info!(path = %self.database_path, "Snapshot store closed");
        }
    }

    fn repository(&self) -> Result<Repository, StoreError> {
        match &*self.read_state() {
            EngineState::Ready(repo) => Ok(repo.clone()),
            EngineState::Failed(reason) => Err(StoreError::StoreUnavailable(reason.clone())),
            EngineState::Uninitialized | EngineState::Initializing => {
                Err(StoreError::NotInitialized)
            }
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("database_path", &self.database_path)
            .field("status", &self.status())
            .finish()
    }
}

#[async_trait]
impl SnapshotStorage for SnapshotStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        let _guard = self.lifecycle.lock().await;

        {
            let mut state = self.write_state();
            match &*state {
                EngineState::Ready(_) => return Ok(()),
                EngineState::Failed(reason) => {
                    return Err(StoreError::StoreUnavailable(reason.clone()))
                }
                EngineState::Uninitialized | EngineState::Initializing => {}
            }
            *state = EngineState::Initializing;
        }

        match init_db(&self.database_path, self.max_connections).await {
            Ok(pool) => {
                *self.write_state() = EngineState::Ready(Repository::new(pool));
                info!(path = %self.database_path, "Snapshot store ready");
                Ok(())
            }
            Err(err) => {
                error!(path = %self.database_path, error = %err, "Snapshot store initialization failed");
                let reason = match &err {
                    StoreError::StoreUnavailable(reason) => reason.clone(),
                    other => other.to_string(),
                };
                *self.write_state() = EngineState::Failed(reason.clone());
                Err(StoreError::StoreUnavailable(reason))
            }
        }
    }

    async fn add_snapshot(&self, page: NewSnapshot) -> Result<SnapshotId, StoreError> {
        let repo = self.repository()?;
        repo.insert_snapshot(&page).await.map_err(|err| {
            error!(url = %page.url, error = %err, "Failed to add snapshot");
            StoreError::write(err)
        })
    }

    async fn get_all_snapshots(&self) -> Result<Vec<Snapshot>, StoreError> {
        let repo = self.repository()?;
        let snapshots = repo.list_snapshots().await.map_err(|err| {
            error!(error = %err, "Failed to list snapshots");
            StoreError::read(err)
        })?;
        debug!(count = snapshots.len(), "Listed snapshots");
        Ok(snapshots)
    }

    async fn delete_snapshot(&self, id: SnapshotId) -> Result<(), StoreError> {
        let repo = self.repository()?;
        let removed = repo.delete_snapshot(id).await.map_err(|err| {
            error!(id = %id, error = %err, "Failed to delete snapshot");
            StoreError::write(err)
        })?;
        debug!(id = %id, removed, "Delete snapshot");
        Ok(())
    }

    async fn clear_all_snapshots(&self) -> Result<(), StoreError> {
        let repo = self.repository()?;
        let removed = repo.clear_snapshots().await.map_err(|err| {
            error!(error = %err, "Failed to clear snapshots");
            StoreError::write(err)
        })?;
        info!(removed, "Cleared all snapshots");
        Ok(())
    }
}
