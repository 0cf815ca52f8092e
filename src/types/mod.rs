//! Core data types for the CouchDB client.

mod document;
mod query;
mod response;

pub use bytes::Bytes;
pub use document::Document;
pub use query::{Query, ViewParams};
pub use response::{status_phrase, CouchResponse};
