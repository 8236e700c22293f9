use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::domain::entities::{Book, BookPatch, Credentials, LoginResponse, NewBook};
use crate::domain::errors::{ApiError, StorageError};

// Identifies which storage handle produced a change. Handles ignore their own
// changes, the same way a browser tab never sees its own `storage` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StorageOrigin(u64);

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

impl StorageOrigin {
    // Changes written by another process, observed by polling.
    pub const EXTERNAL: StorageOrigin = StorageOrigin(0);

    pub fn next() -> Self {
        StorageOrigin(NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed))
    }
}

// Change notification for a single key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    // None when the key was removed.
    pub new_value: Option<String>,
    pub origin: StorageOrigin,
}

// Process-wide authentication signal raised by the HTTP pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    Unauthorized,
}

// Port for persistent key/value storage scoped to this client.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
    fn origin(&self) -> StorageOrigin;
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;

    fn current_year(&self) -> i32 {
        use chrono::Datelike;

        let secs = i64::try_from(self.now_epoch_seconds()).unwrap_or(i64::MAX);
        chrono::DateTime::from_timestamp(secs, 0)
            .map(|now| now.year())
            .unwrap_or(9999)
    }
}

// The session manager depends on this trait, not on the HTTP client.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;
    async fn register(&self, credentials: &Credentials) -> Result<Value, ApiError>;
}

// Raw book endpoints. Error policy is applied by the book service on top.
#[async_trait]
pub trait BookApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Book>, ApiError>;
    async fn get(&self, id: &str) -> Result<Book, ApiError>;
    async fn create(&self, book: &NewBook) -> Result<Book, ApiError>;
    async fn update(&self, id: &str, patch: &BookPatch) -> Result<Book, ApiError>;
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}
