//! Pool of server-issued UUIDs.
//!
//! CouchDB hands out unique identifiers in batches from `_uuids`; the pool
//! caches a batch and pops one identifier per assignment so most saves cost
//! no extra round-trip. The mutex is held across the refill so concurrent
//! callers can neither double-refill nor receive the same identifier.

use crate::error::{CouchError, Result};
use std::future::Future;
use tokio::sync::Mutex;

/// Default number of UUIDs requested per refill.
pub const UUID_BATCH_COUNT: usize = 1000;

/// LIFO cache of pre-fetched unique identifiers.
pub struct UuidPool {
    uuids: Mutex<Vec<String>>,
}

impl UuidPool {
    pub fn new() -> Self {
        UuidPool {
            uuids: Mutex::new(Vec::new()),
        }
    }

    /// Pop one identifier, refilling from `refill(count)` first when the
    /// pool is empty. Refill failures propagate untouched.
    pub async fn next<F, Fut>(&self, count: usize, refill: F) -> Result<String>
    where
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = Result<Vec<String>>>,
    {
        let mut uuids = self.uuids.lock().await;
        if uuids.is_empty() {
            *uuids = refill(count).await?;
        }
        uuids
            .pop()
            .ok_or_else(|| CouchError::Decode("server returned an empty uuid batch".into()))
    }

    pub async fn len(&self) -> usize {
        self.uuids.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.uuids.lock().await.is_empty()
    }
}

impl Default for UuidPool {
    fn default() -> Self {
        Self::new()
    }
}
