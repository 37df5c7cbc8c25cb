//! Persistent key-value backends for session credentials
//!
//! `KeyValueStore` is the seam between the credential adapter and whatever
//! actually persists the tokens. Single-key operations are atomic; grouping
//! several keys into one consistent update is the adapter's job
//! (see `CredentialStore`).
//!
//! `FileStore` keeps a flat JSON object on disk and rewrites it with an atomic
//! temp-file + rename on every mutation. `MemoryStore` keeps the map in
//! process and is used for ephemeral sessions and tests.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Boxed future returned by `KeyValueStore` operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Persistent string-to-string store.
///
/// Uses `Pin<Box<dyn Future>>` return types so the store can be shared as
/// `Arc<dyn KeyValueStore>`. Batches apply all-or-nothing: when one fails,
/// none of its keys change.
pub trait KeyValueStore: Send + Sync {
    /// Read a key. Missing keys are `Ok(None)`, not an error.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Apply a batch of writes. `Some` replaces a value, `None` deletes the key.
    fn set_many<'a>(&'a self, entries: Vec<(&'a str, Option<String>)>) -> StoreFuture<'a, ()>;

    /// Delete several keys at once. Returns whether any of them existed.
    fn remove_many<'a>(&'a self, keys: Vec<&'a str>) -> StoreFuture<'a, bool>;

    /// Write a key, replacing any existing value.
    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        self.set_many(vec![(key, Some(value))])
    }

    /// Delete a key. Returns whether the key existed.
    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        self.remove_many(vec![key])
    }
}

/// Apply a batch to a copy of `entries`.
fn apply_batch(
    entries: &HashMap<String, String>,
    batch: Vec<(&str, Option<String>)>,
) -> HashMap<String, String> {
    let mut next = entries.clone();
    for (key, value) in batch {
        match value {
            Some(value) => {
                next.insert(key.to_string(), value);
            }
            None => {
                next.remove(key);
            }
        }
    }
    next
}

/// In-process store with no persistence.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn set_many<'a>(&'a self, entries: Vec<(&'a str, Option<String>)>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut current = self.entries.lock().await;
            *current = apply_batch(&current, entries);
            Ok(())
        })
    }

    fn remove_many<'a>(&'a self, keys: Vec<&'a str>) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut current = self.entries.lock().await;
            let mut existed = false;
            for key in keys {
                existed |= current.remove(key).is_some();
            }
            Ok(existed)
        })
    }
}

/// JSON file store.
///
/// The Mutex serializes writes; reads clone out of the in-memory copy so they
/// never touch the disk. The in-memory copy is only replaced after the new
/// contents are on disk, so it never runs ahead of the file.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// If the file doesn't exist it is created as `{}` (nobody logged in yet).
    /// Missing parent directories are created.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded session file");
            entries
        } else {
            info!(path = %path.display(), "session file not found, starting logged out");
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(|e| Error::Io(format!("creating session directory: {e}")))?;
                }
            }
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn set_many<'a>(&'a self, entries: Vec<(&'a str, Option<String>)>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut current = self.entries.lock().await;
            let keys = entries.len();
            let next = apply_batch(&current, entries);
            write_atomic(&self.path, &next).await?;
            *current = next;
            debug!(keys, "stored session keys");
            Ok(())
        })
    }

    fn remove_many<'a>(&'a self, keys: Vec<&'a str>) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut current = self.entries.lock().await;
            if !keys.iter().any(|key| current.contains_key(*key)) {
                return Ok(false);
            }
            let next = apply_batch(&current, keys.into_iter().map(|key| (key, None)).collect());
            write_atomic(&self.path, &next).await?;
            *current = next;
            debug!("removed session keys");
            Ok(true)
        })
    }
}

/// Write the session map atomically.
///
/// Temp file in the same directory, then rename over the target so a crash
/// mid-write never leaves a truncated file. Permissions are 0600 since the
/// file holds bearer tokens.
async fn write_atomic(path: &Path, entries: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
