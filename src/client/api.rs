//! The CouchDB client and its document operations.
//!
//! [`CouchClient`] owns the connection, the UUID pool, and the bulk save
//! cache; all shared state is synchronized internally so a client can be
//! used from concurrent tasks through `&self`.
//!
//! Writes come in three flavors:
//!
//! - plain saves PUT one document and block for the server's answer;
//! - bulk saves queue the document and answer `{"ok": true}` immediately,
//!   posting the whole batch once the cache limit is reached (or on the
//!   next non-bulk save, so bulk and non-bulk writes are never reordered
//!   from the caller's perspective);
//! - batch saves pass `batch=ok`, letting the server acknowledge before
//!   durably committing.

use crate::attachments;
use crate::client::bulk::{BulkSaveCache, BULK_SAVE_CACHE_LIMIT};
use crate::client::config::ClientConfig;
use crate::client::connection::Connection;
use crate::client::transport::{NativeTransport, Transport};
use crate::client::uuid_pool::UuidPool;
use crate::endpoint::Endpoint;
use crate::error::{CouchError, Result};
use crate::types::{Bytes, Document, Query, ViewParams};
use serde_json::{json, Value};
use std::sync::Arc;

/// Default bound on fetch/mutate/save cycles in [`CouchClient::update_doc`].
pub const UPDATE_RETRY_LIMIT: usize = 10;

/// Options for a single save.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Queue for bulk submission instead of writing immediately.
    pub bulk: bool,
    /// Ask the server to acknowledge before durably committing.
    pub batch: bool,
}

/// Destination of a document copy.
///
/// Overwriting an existing destination requires its current revision, so a
/// destination is either a bare id or an id/revision pair (rendered as
/// `<id>?rev=<rev>` in the `Destination` header).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyTarget {
    Id(String),
    Revision { id: String, rev: String },
}

impl CopyTarget {
    fn destination(&self) -> String {
        match self {
            CopyTarget::Id(id) => id.clone(),
            CopyTarget::Revision { id, rev } => format!("{id}?rev={rev}"),
        }
    }
}

impl From<&str> for CopyTarget {
    fn from(id: &str) -> Self {
        CopyTarget::Id(id.to_string())
    }
}

impl From<String> for CopyTarget {
    fn from(id: String) -> Self {
        CopyTarget::Id(id)
    }
}

impl TryFrom<&Document> for CopyTarget {
    type Error = CouchError;

    fn try_from(doc: &Document) -> Result<Self> {
        let id = doc.id().ok_or_else(|| {
            CouchError::InvalidArgument("copy destination document has no _id".into())
        })?;
        Ok(match doc.rev() {
            Some(rev) => CopyTarget::Revision {
                id: id.to_string(),
                rev: rev.to_string(),
            },
            None => CopyTarget::Id(id.to_string()),
        })
    }
}

/// Asynchronous CouchDB client.
pub struct CouchClient {
    config: ClientConfig,
    connection: Connection,
    endpoint: Endpoint,
    uuids: UuidPool,
    bulk_cache: BulkSaveCache,
}

impl CouchClient {
    /// Connect using a server URL or bare database name
    /// (see [`ClientConfig::parse`]).
    pub fn new(server_or_db_name: &str) -> Result<Self> {
        Self::with_config(ClientConfig::parse(server_or_db_name)?)
    }

    /// Connect with an explicit configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(NativeTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Build a client on top of a custom [`Transport`].
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let connection = Connection::new(transport, &config);
        let endpoint = Endpoint::new(config.database_url.clone(), config.server_url.clone());
        CouchClient {
            config,
            connection,
            endpoint,
            uuids: UuidPool::new(),
            bulk_cache: BulkSaveCache::new(BULK_SAVE_CACHE_LIMIT),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn db_endpoint(&self) -> Result<&Endpoint> {
        if self.config.is_configured() {
            Ok(&self.endpoint)
        } else {
            Err(CouchError::NotConfigured)
        }
    }

    fn database_name(&self) -> Result<&str> {
        if self.config.is_configured() {
            Ok(&self.config.database_name)
        } else {
            Err(CouchError::NotConfigured)
        }
    }

    // ===== Server information =====

    /// Info about the CouchDB server itself.
    pub async fn couchdb_info(&self) -> Result<Value> {
        self.connection.get(self.endpoint.root_uri(), None).await
    }

    /// Info about the configured database.
    pub async fn database_info(&self) -> Result<Value> {
        let endpoint = self.db_endpoint()?;
        self.connection.get(endpoint.database_uri(), None).await
    }

    // ===== Saving =====

    /// Save a document, blocking for the server's answer.
    ///
    /// A document without an `_id` gets one drawn from the UUID pool before
    /// the PUT. On success the server-assigned `id` and `rev` are written
    /// back onto `doc`.
    pub async fn save_doc(&self, doc: &mut Document) -> Result<Value> {
        self.save_doc_with(doc, SaveOptions::default()).await
    }

    /// Save in bulk mode: see [`SaveOptions::bulk`].
    pub async fn bulk_save_doc(&self, doc: &mut Document) -> Result<Value> {
        self.save_doc_with(
            doc,
            SaveOptions {
                bulk: true,
                batch: false,
            },
        )
        .await
    }

    /// Save in batch mode: see [`SaveOptions::batch`]. Suited to data like
    /// logs that tolerates losing a small window of updates on a crash.
    pub async fn batch_save_doc(&self, doc: &mut Document) -> Result<Value> {
        self.save_doc_with(
            doc,
            SaveOptions {
                bulk: false,
                batch: true,
            },
        )
        .await
    }

    pub async fn save_doc_with(&self, doc: &mut Document, options: SaveOptions) -> Result<Value> {
        if doc.has_attachments() {
            attachments::encode_attachments(doc);
        }

        if options.bulk {
            if let Some(batch) = self.bulk_cache.push(doc.clone()).await {
                self.submit_bulk(batch).await?;
            }
            return Ok(json!({ "ok": true }));
        }

        // Queued bulk writes are submitted before any non-bulk write so the
        // two kinds are never reordered relative to each other.
        if !self.bulk_cache.is_empty().await {
            let pending = self.bulk_cache.drain().await;
            self.submit_bulk(pending).await?;
        }

        let endpoint = self.db_endpoint()?;
        let id = match doc.id().map(str::to_string) {
            Some(id) => id,
            None => {
                let id = self.next_uuid().await?;
                doc.set_id(id.clone());
                id
            }
        };

        let url = endpoint.document_uri(&id, options.batch);
        let response = self.connection.put(&url, Some(&doc.to_value())).await?;

        if response.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            if let Some(id) = response.get("id").and_then(Value::as_str) {
                doc.set_id(id.to_string());
            }
            if let Some(rev) = response.get("rev").and_then(Value::as_str) {
                doc.set_rev(rev.to_string());
            }
        }

        Ok(response)
    }

    /// Submit documents through the bulk endpoint. With `None`, submits
    /// (and empties) the bulk save cache.
    ///
    /// The returned array reports each document's outcome independently;
    /// per-document failures do not fail the batch.
    pub async fn bulk_save(&self, docs: Option<Vec<Document>>) -> Result<Value> {
        let docs = match docs {
            Some(docs) => docs,
            None => self.bulk_cache.drain().await,
        };
        self.submit_bulk(docs).await
    }

    async fn submit_bulk(&self, mut docs: Vec<Document>) -> Result<Value> {
        let endpoint = self.db_endpoint()?;

        let missing = docs.iter().filter(|d| d.id().is_none()).count();
        if missing > 0 {
            let count = missing.max(self.config.uuid_batch_count);
            for doc in docs.iter_mut().filter(|d| d.id().is_none()) {
                match self.next_uuid_from_batch(count).await {
                    Ok(id) => doc.set_id(id),
                    Err(err) => {
                        // Best-effort: id-less documents fall through to
                        // server-side assignment.
                        tracing::warn!("uuid assignment for bulk batch failed: {err}");
                        break;
                    }
                }
            }
        }

        let body = json!({ "docs": docs });
        self.connection
            .post(&endpoint.bulk_docs_uri(), Some(&body))
            .await
    }

    /// Number of writes currently queued for bulk submission.
    pub async fn pending_bulk_len(&self) -> usize {
        self.bulk_cache.len().await
    }

    // ===== Fetching =====

    /// Fetch a document by id.
    pub async fn fetch_doc(&self, id: &str, params: Option<&Query>) -> Result<Document> {
        let endpoint = self.db_endpoint()?;
        let content = self
            .connection
            .get(&endpoint.document_uri(id, false), params)
            .await?;
        Document::try_from(content)
            .map_err(|_| CouchError::Decode("document body is not a JSON object".into()))
    }

    // ===== Deleting =====

    /// Delete a document. Requires both `_id` and `_rev`.
    pub async fn delete_doc(&self, doc: &Document) -> Result<Value> {
        self.delete_doc_with(doc, false).await
    }

    /// Delete a document, optionally queuing a `_deleted` tombstone for
    /// bulk submission instead of deleting immediately.
    pub async fn delete_doc_with(&self, doc: &Document, bulk: bool) -> Result<Value> {
        let (id, rev) = match (doc.id(), doc.rev()) {
            (Some(id), Some(rev)) => (id, rev),
            _ => {
                return Err(CouchError::InvalidArgument(
                    "_id and _rev are required for deleting".into(),
                ))
            }
        };

        if bulk {
            let stub = Document::deletion_stub(id, rev);
            if let Some(batch) = self.bulk_cache.push(stub).await {
                return self.submit_bulk(batch).await;
            }
            return Ok(json!({ "ok": true }));
        }

        let endpoint = self.db_endpoint()?;
        let params = Query::new().with("rev", rev);
        self.connection
            .delete(&endpoint.document_uri(id, false), Some(&params))
            .await
    }

    // ===== Copying =====

    /// Copy a document server-side. Overwrites need the destination's
    /// current revision: pass a [`CopyTarget::Revision`] or convert the
    /// destination document with `CopyTarget::try_from`.
    pub async fn copy_doc(&self, doc: &Document, destination: CopyTarget) -> Result<Value> {
        let id = doc.id().ok_or_else(|| {
            CouchError::InvalidArgument("_id is required for the document being copied".into())
        })?;
        let endpoint = self.db_endpoint()?;
        self.connection
            .copy(&endpoint.document_uri(id, false), &destination.destination())
            .await
    }

    // ===== Updating =====

    /// Update a document under optimistic concurrency: fetch the current
    /// state, apply `mutator`, save, and retry the whole cycle on a
    /// revision conflict, up to [`UPDATE_RETRY_LIMIT`] times.
    pub async fn update_doc<F>(&self, id: &str, mutator: F) -> Result<Document>
    where
        F: FnMut(Document) -> Document,
    {
        self.update_doc_with(id, Query::new(), UPDATE_RETRY_LIMIT, mutator)
            .await
    }

    /// [`update_doc`](Self::update_doc) with explicit fetch parameters and
    /// retry limit.
    ///
    /// Only conflicts are retried; any other failure propagates
    /// immediately. Once the budget is exhausted the conflict itself is
    /// returned.
    pub async fn update_doc_with<F>(
        &self,
        id: &str,
        params: Query,
        retry_limit: usize,
        mut mutator: F,
    ) -> Result<Document>
    where
        F: FnMut(Document) -> Document,
    {
        let endpoint = self.db_endpoint()?;
        let url = endpoint.document_uri(id, false);
        let params = if params.is_empty() {
            None
        } else {
            Some(params)
        };

        let mut remaining = retry_limit;
        loop {
            if remaining == 0 {
                return Err(CouchError::Conflict(format!(
                    "update of '{id}' exhausted its retry budget"
                )));
            }

            let content = self.connection.get(&url, params.as_ref()).await?;
            let doc = Document::try_from(content)
                .map_err(|_| CouchError::Decode("document body is not a JSON object".into()))?;
            let mut updated = mutator(doc);

            match self.save_doc(&mut updated).await {
                Ok(_) => return Ok(updated),
                Err(err) if err.is_conflict() => {
                    remaining -= 1;
                    if remaining == 0 {
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    // ===== Views =====

    /// Query a view of a design document. An explicit key list goes out as
    /// a POST body to sidestep URL length limits; other parameters always
    /// travel in the query string.
    pub async fn view(
        &self,
        design_doc: &str,
        view_name: &str,
        params: ViewParams,
    ) -> Result<Value> {
        let endpoint = self.db_endpoint()?;
        self.run_view(endpoint.view_uri(design_doc, view_name), params)
            .await
    }

    /// Query the built-in `_all_docs` view.
    pub async fn documents(&self, params: ViewParams) -> Result<Value> {
        let endpoint = self.db_endpoint()?;
        self.run_view(endpoint.documents_uri(), params).await
    }

    /// Fetch a set of documents by id in one request.
    pub async fn get_bulk(&self, ids: &[&str]) -> Result<Value> {
        let keys = ids.iter().map(|id| Value::String((*id).to_string())).collect();
        self.documents(
            ViewParams::new()
                .with_keys(keys)
                .with_param("include_docs", true),
        )
        .await
    }

    async fn run_view(&self, url: String, params: ViewParams) -> Result<Value> {
        match params.keys {
            Some(keys) => {
                let url = if params.query.is_empty() {
                    url
                } else {
                    format!("{url}?{}", params.query.encode())
                };
                self.connection.post(&url, Some(&json!({ "keys": keys }))).await
            }
            None => {
                let query = if params.query.is_empty() {
                    None
                } else {
                    Some(&params.query)
                };
                self.connection.get(&url, query).await
            }
        }
    }

    /// Query a couchdb-lucene search view.
    pub async fn search(
        &self,
        design_doc: &str,
        view_name: &str,
        params: &Query,
    ) -> Result<Value> {
        let endpoint = self.db_endpoint()?;
        let query = if params.is_empty() { None } else { Some(params) };
        self.connection
            .get(&endpoint.search_uri(design_doc, view_name), query)
            .await
    }

    // ===== Attachments =====

    /// Fetch an attachment's raw content.
    pub async fn fetch_attachment(&self, doc: &Document, name: &str) -> Result<Bytes> {
        let id = doc.id().ok_or_else(|| {
            CouchError::InvalidArgument("_id is required to fetch an attachment".into())
        })?;
        let endpoint = self.db_endpoint()?;
        self.connection
            .get_raw(&endpoint.attachment_uri(id, name, doc.rev()), None)
            .await
    }

    /// Delete an attachment. Requires the document's `_id` and `_rev`.
    pub async fn delete_attachment(&self, doc: &Document, name: &str) -> Result<Value> {
        let (id, rev) = match (doc.id(), doc.rev()) {
            (Some(id), Some(rev)) => (id, rev),
            _ => {
                return Err(CouchError::InvalidArgument(
                    "_id and _rev are required for deleting an attachment".into(),
                ))
            }
        };
        let endpoint = self.db_endpoint()?;
        self.connection
            .delete(&endpoint.attachment_uri(id, name, Some(rev)), None)
            .await
    }

    // ===== Database administration =====

    /// Compact the database, dropping old document revisions.
    pub async fn compact(&self) -> Result<Value> {
        let endpoint = self.db_endpoint()?;
        self.connection.post(&endpoint.compact_uri(), None).await
    }

    /// Create the configured database.
    pub async fn create_database(&self) -> Result<Value> {
        let endpoint = self.db_endpoint()?;
        self.connection.put(endpoint.database_uri(), None).await
    }

    /// Delete the configured database. Irreversible, so it refuses to act
    /// unless `confirm` is set: without it, no request is issued and
    /// `false` is returned.
    pub async fn delete_database(&self, confirm: bool) -> Result<Value> {
        if !confirm {
            return Ok(Value::Bool(false));
        }
        let endpoint = self.db_endpoint()?;
        self.connection.delete(endpoint.database_uri(), None).await
    }

    /// List all databases on the server.
    pub async fn databases(&self) -> Result<Vec<String>> {
        let content = self
            .connection
            .get(&self.endpoint.databases_uri(), None)
            .await?;
        serde_json::from_value(content)
            .map_err(|e| CouchError::Decode(format!("database list: {e}")))
    }

    /// Restart the CouchDB server.
    pub async fn restart(&self) -> Result<Value> {
        self.connection.post(&self.endpoint.restart_uri(), None).await
    }

    // ===== Replication =====

    /// Pull `source` into the configured database. Conflicts are left to
    /// the server's resolution.
    pub async fn replicate_from(
        &self,
        source: &str,
        continuous: bool,
        create_target: bool,
    ) -> Result<Value> {
        let name = self.database_name()?.to_string();
        self.replicate(json!({
            "source": source,
            "target": name,
            "continuous": continuous,
            "create_target": create_target,
        }))
        .await
    }

    /// Push the configured database to `target`.
    pub async fn replicate_to(
        &self,
        target: &str,
        continuous: bool,
        create_target: bool,
    ) -> Result<Value> {
        let name = self.database_name()?.to_string();
        self.replicate(json!({
            "source": name,
            "target": target,
            "continuous": continuous,
            "create_target": create_target,
        }))
        .await
    }

    async fn replicate(&self, body: Value) -> Result<Value> {
        let endpoint = self.db_endpoint()?;
        self.connection
            .post(&endpoint.replicate_uri(), Some(&body))
            .await
    }

    // ===== UUIDs =====

    /// Hand out one server-issued UUID, refilling the pool in batches of
    /// [`ClientConfig::uuid_batch_count`] when it runs dry.
    pub async fn next_uuid(&self) -> Result<String> {
        self.next_uuid_from_batch(self.config.uuid_batch_count).await
    }

    /// Number of identifiers currently cached in the UUID pool.
    pub async fn uuid_pool_len(&self) -> usize {
        self.uuids.len().await
    }

    async fn next_uuid_from_batch(&self, count: usize) -> Result<String> {
        self.uuids
            .next(count, |count| async move {
                let query = Query::new().with("count", count);
                let content = self
                    .connection
                    .get(&self.endpoint.uuids_uri(), Some(&query))
                    .await?;
                let uuids = content
                    .get("uuids")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        CouchError::Decode("uuid response missing 'uuids' array".into())
                    })?
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                Ok(uuids)
            })
            .await
    }
}
