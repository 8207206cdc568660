//! The boundary between the UI state machine and everything that touches the
//! disk, the watcher or persisted settings.
//!
//! Every call is async and may fail. Boolean-returning operations use `false`
//! for "did not complete"; callers treat that as a normal outcome.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::fs::operations::{self, validate_entry_name, DirEntry};
use crate::fs::paths::normalize_path;
use crate::fs::watcher::{ChangeEvent, SubscriberId, WatchManager, WatchOptions};
use crate::settings::SettingsStore;

/// Result of `refresh_directory`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub success: bool,
    pub files: Option<Vec<DirEntry>>,
    pub message: Option<String>,
}

impl RefreshOutcome {
    pub fn ok(files: Vec<DirEntry>) -> Self {
        Self {
            success: true,
            files: Some(files),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            files: None,
            message: Some(message.into()),
        }
    }

    /// Listing for `path`, or `DirectoryUnreadable` with the bridge's message.
    pub fn into_result(self, path: &Path) -> Result<Vec<DirEntry>> {
        match (self.success, self.files) {
            (true, Some(files)) => Ok(files),
            _ => Err(AppError::DirectoryUnreadable {
                path: path.to_path_buf(),
                reason: self.message.unwrap_or_else(|| "refresh failed".to_string()),
            }),
        }
    }
}

/// Result of `create_file` / `create_directory`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub success: bool,
    pub entry: Option<DirEntry>,
    pub message: Option<String>,
}

impl CreateOutcome {
    fn created(entry: DirEntry) -> Self {
        Self {
            success: true,
            entry: Some(entry),
            message: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            entry: None,
            message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Immediate children of `path`.
    async fn read_directory(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Fresh listing of `path`, reported as an outcome rather than an error.
    async fn refresh_directory(&self, path: &Path) -> RefreshOutcome;

    async fn directory_exists(&self, path: &Path) -> bool;

    async fn read_file(&self, path: &Path) -> Result<String>;

    async fn write_file(&self, path: &Path, content: &str) -> bool;

    async fn create_file(&self, dir_path: &Path, file_name: &str) -> CreateOutcome;

    async fn create_directory(&self, dir_path: &Path, folder_name: &str) -> CreateOutcome;

    /// Establish the single watch session on `root`, replacing any other.
    async fn start_or_restart_watch(&self, root: &Path) -> bool;

    async fn stop_watch(&self);

    /// Whether the current watch session is live.
    async fn watch_status(&self) -> bool;

    /// Register a change listener. Every listener receives every event.
    fn on_file_changed(&self) -> (SubscriberId, mpsc::UnboundedReceiver<ChangeEvent>);

    fn remove_listener(&self, id: SubscriberId);

    async fn get_setting(&self, key: &str) -> Option<Value>;

    /// `Value::Null` deletes the key.
    async fn set_setting(&self, key: &str, value: Value) -> bool;
}

/// Host bridge backed by the local file system, running blocking work on
/// tokio's blocking pool.
pub struct LocalHostBridge {
    watcher: Arc<WatchManager>,
    settings: Mutex<SettingsStore>,
}

impl LocalHostBridge {
    pub fn new(watch_options: WatchOptions, settings: SettingsStore) -> Self {
        Self {
            watcher: Arc::new(WatchManager::new(watch_options)),
            settings: Mutex::new(settings),
        }
    }

    async fn create_entry(&self, dir_path: &Path, name: &str, is_directory: bool) -> CreateOutcome {
        let name = match validate_entry_name(name) {
            Ok(name) => name.to_string(),
            Err(message) => return CreateOutcome::failed(message),
        };
        let path = normalize_path(&dir_path.join(&name));
        let target = path.clone();
        let result = blocking(move || {
            if is_directory {
                operations::create_dir(&target)
            } else {
                operations::create_file(&target)
            }
        })
        .await;

        let kind = if is_directory { "folder" } else { "file" };
        match result {
            Ok(()) => {
                info!(path = %path.display(), kind, "created");
                CreateOutcome::created(DirEntry {
                    name,
                    path,
                    is_directory,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                CreateOutcome::failed(format!("A file or folder named '{name}' already exists"))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, kind, "create failed");
                CreateOutcome::failed(format!("Could not create {kind} '{name}': {e}"))
            }
        }
    }
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(io::Error::other(e)))
}

#[async_trait]
impl HostBridge for LocalHostBridge {
    async fn read_directory(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let dir = path.to_path_buf();
        blocking(move || operations::list_directory(&dir))
            .await
            .map_err(|e| AppError::DirectoryUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn refresh_directory(&self, path: &Path) -> RefreshOutcome {
        match self.read_directory(path).await {
            Ok(files) => RefreshOutcome::ok(files),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "refresh read failed");
                RefreshOutcome::failed(e.to_string())
            }
        }
    }

    async fn directory_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn write_file(&self, path: &Path, content: &str) -> bool {
        match tokio::fs::write(path, content).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = content.len(), "file written");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "write failed");
                false
            }
        }
    }

    async fn create_file(&self, dir_path: &Path, file_name: &str) -> CreateOutcome {
        self.create_entry(dir_path, file_name, false).await
    }

    async fn create_directory(&self, dir_path: &Path, folder_name: &str) -> CreateOutcome {
        self.create_entry(dir_path, folder_name, true).await
    }

    async fn start_or_restart_watch(&self, root: &Path) -> bool {
        let watcher = Arc::clone(&self.watcher);
        let root: PathBuf = root.to_path_buf();
        let root_label = root.display().to_string();
        let started = tokio::task::spawn_blocking(move || watcher.start(&root)).await;
        match started {
            Ok(Ok(_handle)) => true,
            Ok(Err(e)) => {
                warn!(root = %root_label, error = %e, "could not start watcher");
                false
            }
            Err(e) => {
                warn!(root = %root_label, error = %e, "watcher start task failed");
                false
            }
        }
    }

    async fn stop_watch(&self) {
        self.watcher.stop_current();
    }

    async fn watch_status(&self) -> bool {
        self.watcher.is_watching()
    }

    fn on_file_changed(&self) -> (SubscriberId, mpsc::UnboundedReceiver<ChangeEvent>) {
        self.watcher.subscribers().subscribe()
    }

    fn remove_listener(&self, id: SubscriberId) {
        self.watcher.subscribers().unsubscribe(id);
    }

    async fn get_setting(&self, key: &str) -> Option<Value> {
        self.settings.lock().await.get(key).cloned()
    }

    async fn set_setting(&self, key: &str, value: Value) -> bool {
        let mut store = self.settings.lock().await;
        store.set(key, value);
        let Some(path) = store.path().map(Path::to_path_buf) else {
            return true;
        };
        let json = match store.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "cannot serialize settings");
                return false;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %e, "cannot create settings dir");
                return false;
            }
        }
        match tokio::fs::write(&path, json).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot write settings");
                false
            }
        }
    }
}
