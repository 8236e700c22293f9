use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::errors::StorageError;
use crate::domain::ports::{Storage, StorageEvent, StorageOrigin};

// Well-known storage key holding the raw bearer token.
pub const TOKEN_KEY: &str = "authToken";

// Bearer token persistence on top of the storage port. No expiry checks here.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    // Unreadable storage counts as no token.
    pub fn get(&self) -> Option<String> {
        match self.storage.get_item(TOKEN_KEY) {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(%error, "failed to read stored token");
                None
            }
        }
    }

    pub fn set(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set_item(TOKEN_KEY, token)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(TOKEN_KEY)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.storage.subscribe()
    }

    pub fn origin(&self) -> StorageOrigin {
        self.storage.origin()
    }
}
