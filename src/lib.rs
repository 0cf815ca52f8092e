//! davenport: an async CouchDB client.
//!
//! Translates document operations (save, fetch, delete, bulk save, copy,
//! view queries) into HTTP requests against a CouchDB server and maps the
//! replies back into structured results or typed failures.
//!
//! ```no_run
//! use davenport::{CouchClient, Document};
//! use serde_json::json;
//!
//! # async fn example() -> davenport::Result<()> {
//! let client = CouchClient::new("my_db")?;
//! let mut doc = Document::try_from(json!({ "driver": "senna" }))?;
//! client.save_doc(&mut doc).await?;
//! assert!(doc.rev().is_some());
//! # Ok(())
//! # }
//! ```

pub mod attachments;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod types;

pub use client::{
    BulkSaveCache, ClientConfig, Connection, CopyTarget, CouchClient, Method, NativeTransport,
    SaveOptions, Transport, UuidPool, WireRequest, BULK_SAVE_CACHE_LIMIT, UPDATE_RETRY_LIMIT,
    UUID_BATCH_COUNT,
};
pub use endpoint::Endpoint;
pub use error::{CouchError, Result};
pub use types::{CouchResponse, Document, Query, ViewParams};
