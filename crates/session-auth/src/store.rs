//! Durable key-value storage for encrypted session blobs
//!
//! Values written are always already-encrypted strings; values read back
//! are the raw strings or absent. `FileStore` keeps every slot in one JSON
//! file and commits each `set_many` with a single atomic rename, so the
//! token and metadata slots can never be observed half-written.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// String-keyed storage for encrypted blobs.
///
/// Uses `Pin<Box<dyn Future>>` return types so the manager can hold an
/// `Arc<dyn PersistentStore>`.
pub trait PersistentStore: Send + Sync {
    /// Write all entries. Either all are visible afterwards or the call errors.
    fn set_many(&self, entries: Vec<(String, String)>) -> StoreFuture<'_, ()>;

    /// Read the given keys; the result is positional, `None` for missing keys.
    fn get_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, Vec<Option<String>>>;

    /// Remove the given keys. Missing keys are not an error.
    fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()>;
}

/// JSON-file backed store.
///
/// The Mutex serializes writers; reads clone out of the in-memory copy.
/// The in-memory map only changes after the file write succeeds.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, creating an empty file on cold start.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Storage(format!("reading session file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded session store");
            entries
        } else {
            info!(path = %path.display(), "session file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistentStore for FileStore {
    fn set_many(&self, entries: Vec<(String, String)>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut next = state.clone();
            let count = entries.len();
            next.extend(entries);
            write_atomic(&self.path, &next).await?;
            *state = next;
            debug!(entries = count, "stored session entries");
            Ok(())
        })
    }

    fn get_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, Vec<Option<String>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(keys.iter().map(|k| state.get(*k).cloned()).collect())
        })
    }

    fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if !keys.iter().any(|k| state.contains_key(*k)) {
                return Ok(());
            }
            let mut next = state.clone();
            for key in keys {
                next.remove(*key);
            }
            write_atomic(&self.path, &next).await?;
            *state = next;
            debug!(keys = keys.len(), "removed session entries");
            Ok(())
        })
    }
}

/// Write the entry map atomically: temp file in the same directory, 0600,
/// then rename over the target.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing session entries: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session file");
    Ok(())
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl PersistentStore for MemoryStore {
    fn set_many(&self, entries: Vec<(String, String)>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.state.lock().await.extend(entries);
            Ok(())
        })
    }

    fn get_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, Vec<Option<String>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(keys.iter().map(|k| state.get(*k).cloned()).collect())
        })
    }

    fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            for key in keys {
                state.remove(*key);
            }
            Ok(())
        })
    }
}
