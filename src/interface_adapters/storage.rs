use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::broadcast;

use crate::domain::errors::StorageError;
use crate::domain::ports::{Storage, StorageEvent, StorageOrigin};
use crate::use_cases::subscription::Subscription;

const EVENT_CHANNEL_CAPACITY: usize = 64;

// In-memory storage. Each handle from `open_tab` shares the same items and
// change feed but has its own origin.
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
    events: broadcast::Sender<StorageEvent>,
    origin: StorageOrigin,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            items: Arc::new(Mutex::new(HashMap::new())),
            events,
            origin: StorageOrigin::next(),
        }
    }

    pub fn open_tab(&self) -> Self {
        Self {
            items: self.items.clone(),
            events: self.events.clone(),
            origin: StorageOrigin::next(),
        }
    }

    fn publish(&self, key: &str, new_value: Option<String>) {
        // No subscribers is fine.
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
            origin: self.origin,
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = {
            let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
            items.insert(key.to_string(), value.to_string())
        };
        if previous.as_deref() != Some(value) {
            self.publish(key, Some(value.to_string()));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let removed = {
            let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
            items.remove(key)
        };
        if removed.is_some() {
            self.publish(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn origin(&self) -> StorageOrigin {
        self.origin
    }
}

// On-disk layout of the storage file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    #[serde(default)]
    items: BTreeMap<String, String>,
}

// TOML file storage. Reads always hit the disk so another process's writes
// are seen; `spawn_watcher` turns those writes into change events.
pub struct FileStorage {
    path: PathBuf,
    events: broadcast::Sender<StorageEvent>,
    origin: StorageOrigin,
    // Items as last written or observed by this process.
    seen: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let current = load(&path)?.items;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            events,
            origin: StorageOrigin::next(),
            seen: Arc::new(Mutex::new(current)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Another handle on the same file and change feed, with its own origin.
    pub fn open_tab(&self) -> Self {
        Self {
            path: self.path.clone(),
            events: self.events.clone(),
            origin: StorageOrigin::next(),
            seen: self.seen.clone(),
        }
    }

    // Polls the file and publishes external changes. Must be called inside a
    // tokio runtime.
    pub fn spawn_watcher(&self, interval: Duration) -> Subscription {
        let path = self.path.clone();
        let events = self.events.clone();
        let seen = self.seen.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                // Read under the snapshot lock so a write from this process
                // cannot land between the read and the diff.
                let changes = {
                    let Ok(mut seen) = seen.lock() else {
                        tracing::error!("storage snapshot lock poisoned, stopping watcher");
                        return;
                    };
                    let current = match load(&path) {
                        Ok(file) => file.items,
                        Err(error) => {
                            tracing::warn!(%error, path = %path.display(), "failed to poll storage file");
                            continue;
                        }
                    };
                    let changes = diff(&seen, &current);
                    *seen = current;
                    changes
                };

                for (key, new_value) in changes {
                    tracing::debug!(%key, "storage changed outside this process");
                    let _ = events.send(StorageEvent {
                        key,
                        new_value,
                        origin: StorageOrigin::EXTERNAL,
                    });
                }
            }
        });

        Subscription::new(task)
    }

    fn update(
        &self,
        key: &str,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> Option<String>,
    ) -> Result<(), StorageError> {
        let mut seen = self.seen.lock().map_err(|_| StorageError::Poisoned)?;
        let mut file = load(&self.path)?;
        let before = file.items.get(key).cloned();
        let after = apply(&mut file.items);
        save(&self.path, &file)?;
        *seen = file.items;
        drop(seen);

        if before != after {
            let _ = self.events.send(StorageEvent {
                key: key.to_string(),
                new_value: after,
                origin: self.origin,
            });
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(load(&self.path)?.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(key, |items| {
            items.insert(key.to_string(), value.to_string());
            Some(value.to_string())
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.update(key, |items| {
            items.remove(key);
            None
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn origin(&self) -> StorageOrigin {
        self.origin
    }
}

fn load(path: &Path) -> Result<StorageFile, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(toml::from_str(&raw)?),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(StorageFile::default()),
        Err(error) => Err(error.into()),
    }
}

// Write to a uniquely named sibling temp file, then rename over the target.
// Concurrent writers never share a temp file, so the last rename wins.
fn save(path: &Path, file: &StorageFile) -> Result<(), StorageError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let encoded = toml::to_string(file)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(encoded.as_bytes())?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn diff(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> Vec<(String, Option<String>)> {
    let mut changes = Vec::new();
    for (key, value) in after {
        if before.get(key) != Some(value) {
            changes.push((key.clone(), Some(value.clone())));
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            changes.push((key.clone(), None));
        }
    }
    changes
}
