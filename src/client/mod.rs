//! CouchDB client implementation.

mod api;
mod bulk;
mod config;
mod connection;
mod transport;
mod uuid_pool;

pub use api::{CopyTarget, CouchClient, SaveOptions, UPDATE_RETRY_LIMIT};
pub use bulk::{BulkSaveCache, BULK_SAVE_CACHE_LIMIT};
pub use config::ClientConfig;
pub use connection::Connection;
pub use transport::{Method, NativeTransport, Transport, WireRequest};
pub use uuid_pool::{UuidPool, UUID_BATCH_COUNT};
