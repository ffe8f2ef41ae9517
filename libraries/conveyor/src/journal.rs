//! The durable side of the queue: an ordered log of not-yet-confirmed tasks,
//! written through to a blob store so it survives a reload.
//!
//! Persistence is best-effort by contract. If the store is unavailable
//! (private browsing, quota exceeded) or the blob is corrupt, the journal
//! keeps working from its in-memory copy and reports the degradation to the
//! telemetry sink; the user's edits must never block on storage.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Telemetry, TelemetryEvent};

/// Synchronous get/set of a single serialized blob under a fixed key.
pub trait BlobStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// In-memory store, used natively and in tests.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.blobs.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Implemented by journal entry types so the journal can rewrite a
/// locally-invented identifier once the server assigns the real one.
pub trait RewriteRefs {
    fn rewrite_reference(&mut self, old_id: &str, new_id: &str);
}

#[derive(Serialize)]
struct PersistedQueueRef<'a, T> {
    queue: &'a [T],
}

#[derive(Deserialize)]
struct PersistedQueue<T> {
    queue: Vec<T>,
}

/// Ordered, durable list of pending tasks. The in-memory `Vec` is the
/// authoritative copy within the process; every mutation writes through.
pub struct Journal<T> {
    store: Rc<dyn BlobStore>,
    key: String,
    entries: Vec<T>,
    telemetry: Rc<dyn Telemetry>,
}

impl<T> Journal<T>
where
    T: Serialize + DeserializeOwned + RewriteRefs,
{
    /// Load the persisted journal. An unavailable store or a corrupt blob
    /// yields an empty journal, never an error.
    pub fn load(store: Rc<dyn BlobStore>, key: impl Into<String>, telemetry: Rc<dyn Telemetry>) -> Self {
        let key = key.into();
        let entries = match store.read(&key) {
            Ok(Some(blob)) => match serde_json::from_str::<PersistedQueue<T>>(&blob) {
                Ok(persisted) => persisted.queue,
                Err(error) => {
                    log::warn!("discarding corrupt mutation journal: {error}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(error) => {
                log::warn!("mutation journal unreadable, starting empty: {error}");
                telemetry.log(TelemetryEvent {
                    workflow: "MutationJournal",
                    instance: "load-failed",
                    detail: error.to_string(),
                });
                Vec::new()
            }
        };

        let journal = Self {
            store,
            key,
            entries,
            telemetry,
        };
        if journal.entries.is_empty() {
            // Seed the blob so a later read distinguishes "empty" from "gone".
            journal.persist();
        }
        journal
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a task, returning its position.
    pub fn push(&mut self, entry: T) -> usize {
        self.entries.push(entry);
        self.persist();
        self.entries.len() - 1
    }

    /// Overwrite the entry at `position` in place (used when a pending task
    /// absorbs a newer edit). Returns `false` when the position is gone.
    pub fn replace(&mut self, position: usize, entry: T) -> bool {
        match self.entries.get_mut(position) {
            Some(slot) => {
                *slot = entry;
                self.persist();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, position: usize) -> Option<T> {
        if position >= self.entries.len() {
            return None;
        }
        let entry = self.entries.remove(position);
        self.persist();
        Some(entry)
    }

    /// Replace every occurrence of `old_id` in still-queued entries (payloads
    /// and snapshots alike) with the server-confirmed `new_id`.
    pub fn rewrite_references(&mut self, old_id: &str, new_id: &str) {
        for entry in &mut self.entries {
            entry.rewrite_reference(old_id, new_id);
        }
        self.persist();
    }

    fn persist(&self) {
        let blob = match serde_json::to_string(&PersistedQueueRef {
            queue: &self.entries,
        }) {
            Ok(blob) => blob,
            Err(error) => {
                log::warn!("could not serialize mutation journal: {error}");
                return;
            }
        };

        if let Err(error) = self.store.write(&self.key, &blob) {
            // Degraded mode: the edit still happens, it just won't survive a
            // reload. Surfacing this to the user would only block them.
            log::warn!("mutation journal not persisted: {error}");
            self.telemetry.log(TelemetryEvent {
                workflow: "MutationJournal",
                instance: "persist-failed",
                detail: error.to_string(),
            });
        }
    }
}
