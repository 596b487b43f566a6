// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Persists the per-source baselines across daemon restarts, so a restart
// neither re-notifies for a change that was already broadcast nor re-seeds
// every source from scratch.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Corruption detection: JSON validated on load
// - Automatic backup: keeps .backup of last known good state
// - Recovery: falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "sources": {
//     "bili-live": {
//       "comparison": { "kind": "toggle", "active": true },
//       "last_item": null,
//       "committed_at": "2025-06-01T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{ComparisonValue, SourceState, StateStore, StateStoreFactory};

/// State file format version
/// Used for future migration if format changes
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// State is persisted to a JSON file with atomic writes and automatic
/// corruption recovery. Every commit is written through immediately.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    sources: HashMap<String, SourceState>,
    dirty: bool,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    sources: HashMap<String, SourceState>,
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// This will:
    /// 1. Try to load an existing state file
    /// 2. If corruption is detected, try to load from backup
    /// 3. If both fail, start with empty state
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let sources = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                sources,
                dirty: false,
            })),
        })
    }

    /// Load state from file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load the main state file
    /// 2. On a parse error, try loading the backup
    /// 3. If the backup also fails, start with empty state
    async fn load_state_with_recovery(path: &Path) -> Result<HashMap<String, SourceState>, Error> {
        match Self::load_state(path).await {
            Ok(sources) => {
                tracing::debug!("loaded state file: {} source(s)", sources.len());
                Ok(sources)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "state file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if backup_path.exists() {
                    match Self::load_state(&backup_path).await {
                        Ok(sources) => {
                            tracing::info!(
                                "recovered state from backup: {} source(s)",
                                sources.len()
                            );

                            if let Err(restore_err) =
                                Self::restore_from_backup(path, &backup_path).await
                            {
                                tracing::error!(
                                    "failed to restore state file from backup: {}",
                                    restore_err
                                );
                            }

                            Ok(sources)
                        }
                        Err(backup_err) => {
                            tracing::error!(
                                "backup also corrupted: {}. Starting with empty state.",
                                backup_err
                            );
                            Ok(HashMap::new())
                        }
                    }
                } else {
                    tracing::warn!("no backup file found, starting with empty state");
                    Ok(HashMap::new())
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load state from one file
    async fn load_state(path: &Path) -> Result<HashMap<String, SourceState>, Error> {
        if !path.exists() {
            tracing::debug!("state file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!(
                "failed to read state file {}: {}",
                path.display(),
                e
            ))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content)?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "state file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.sources)
    }

    /// Write state to file atomically
    async fn write_state(&self) -> Result<(), Error> {
        let json = {
            let state_guard = self.state.read().await;
            let state_file = StateFileFormat {
                version: STATE_FILE_VERSION.to_string(),
                sources: state_guard.sources.clone(),
            };
            serde_json::to_string_pretty(&state_file)?
        };

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Keep a backup of the current file (if it exists)
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("failed to create backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        {
            let mut state_guard = self.state.write().await;
            state_guard.dirty = false;
        }

        tracing::trace!("state written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore state file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::state_store(format!(
                "failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("restored state file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Force immediate write to disk
    pub async fn sync(&self) -> Result<(), Error> {
        self.write_state().await
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_comparison(&self, source_id: &str) -> Result<Option<ComparisonValue>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.sources.get(source_id).map(|s| s.comparison))
    }

    async fn get(&self, source_id: &str) -> Result<Option<SourceState>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.sources.get(source_id).cloned())
    }

    async fn commit(&self, source_id: &str, state: &SourceState) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard
                .sources
                .insert(source_id.to_string(), state.clone());
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_state().await
    }

    async fn remove(&self, source_id: &str) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard.sources.remove(source_id);
            state_guard.dirty = true;
        }

        self.write_state().await
    }

    async fn list_sources(&self) -> Result<Vec<String>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.sources.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let state_guard = self.state.read().await;
        if state_guard.dirty {
            drop(state_guard);
            self.write_state().await
        } else {
            Ok(())
        }
    }
}

/// Factory for creating file state stores
pub struct FileStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn StateStore>, Error> {
        let path = config
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::config("file state store needs a 'path'"))?;
        Ok(Box::new(FileStateStore::new(path).await?))
    }
}
