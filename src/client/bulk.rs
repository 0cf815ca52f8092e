//! Buffer of pending bulk writes.
//!
//! Documents queued for bulk submission live here until a flush. The drain
//! swaps in a fresh buffer while still holding the lock, so writes enqueued
//! during an in-flight flush land in the new buffer instead of the batch
//! being posted.

use crate::types::Document;
use tokio::sync::Mutex;

/// Queued writes at or above this count trigger an automatic flush.
pub const BULK_SAVE_CACHE_LIMIT: usize = 750;

/// Process-local buffer of documents awaiting bulk submission.
pub struct BulkSaveCache {
    docs: Mutex<Vec<Document>>,
    limit: usize,
}

impl BulkSaveCache {
    pub fn new(limit: usize) -> Self {
        BulkSaveCache {
            docs: Mutex::new(Vec::new()),
            limit,
        }
    }

    /// Append a document. When the buffer reaches the limit, the whole
    /// batch is drained and returned for the caller to flush immediately.
    pub async fn push(&self, doc: Document) -> Option<Vec<Document>> {
        let mut docs = self.docs.lock().await;
        docs.push(doc);
        if docs.len() >= self.limit {
            Some(std::mem::take(&mut *docs))
        } else {
            None
        }
    }

    /// Take everything queued, leaving an empty buffer.
    pub async fn drain(&self) -> Vec<Document> {
        std::mem::take(&mut *self.docs.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.lock().await.is_empty()
    }
}

impl Default for BulkSaveCache {
    fn default() -> Self {
        Self::new(BULK_SAVE_CACHE_LIMIT)
    }
}
