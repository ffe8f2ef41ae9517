//! `window.localStorage`-backed blob store for browser builds.

use web_sys::Storage;

use crate::journal::{BlobStore, StoreError};

/// Blob store over the browser's localStorage. Unavailability (private
/// browsing, storage disabled) is detected once at construction; every
/// operation then reports it instead of panicking.
pub struct BrowserStore {
    storage: Option<Storage>,
}

impl BrowserStore {
    pub fn new() -> Self {
        let storage = web_sys::window().and_then(|window| window.local_storage().ok().flatten());
        if storage.is_none() {
            log::warn!("localStorage unavailable; pending mutations will not survive a reload");
        }
        Self { storage }
    }

    fn storage(&self) -> Result<&Storage, StoreError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("localStorage missing".to_string()))
    }
}

impl Default for BrowserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for BrowserStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage()?
            .get_item(key)
            .map_err(|error| StoreError::Unavailable(format!("{error:?}")))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // Quota-exceeded lands here too.
        self.storage()?
            .set_item(key, value)
            .map_err(|error| StoreError::Unavailable(format!("{error:?}")))
    }
}
