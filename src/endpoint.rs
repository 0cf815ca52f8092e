//! Canonical resource URIs for a CouchDB server and database.
//!
//! Every URI is a simple join of a configured base URL and a literal or
//! escaped segment. Database-scoped paths hang off the database URL;
//! server-scoped paths (`_uuids`, `_all_dbs`, `_restart`) hang off the
//! server root.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left bare in escaped document ids and view names.
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Builds resource URIs from the configured database and server URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    database_url: String,
    server_url: String,
}

impl Endpoint {
    pub fn new(database_url: impl Into<String>, server_url: impl Into<String>) -> Self {
        Endpoint {
            database_url: database_url.into(),
            server_url: server_url.into(),
        }
    }

    /// The database URL itself.
    pub fn database_uri(&self) -> &str {
        &self.database_url
    }

    /// The server root URL itself.
    pub fn root_uri(&self) -> &str {
        &self.server_url
    }

    fn database_join(&self, path: &str) -> String {
        format!("{}/{}", self.database_url, path)
    }

    fn root_join(&self, path: &str) -> String {
        format!("{}/{}", self.server_url, path)
    }

    /// URI for a single document. With `batch` set, appends the `batch=ok`
    /// marker that lets the server acknowledge before durably committing.
    pub fn document_uri(&self, doc_id: &str, batch: bool) -> String {
        let slug = escape_doc_id(doc_id);
        if batch {
            self.database_join(&format!("{slug}?batch=ok"))
        } else {
            self.database_join(&slug)
        }
    }

    /// URI for the `_all_docs` view.
    pub fn documents_uri(&self) -> String {
        self.database_join("_all_docs")
    }

    /// URI for the bulk write endpoint.
    pub fn bulk_docs_uri(&self) -> String {
        self.database_join("_bulk_docs")
    }

    /// URI for a design document.
    pub fn design_uri(&self, design_doc: &str) -> String {
        self.database_join(&design_path(design_doc))
    }

    /// URI for a view of a design document.
    pub fn view_uri(&self, design_doc: &str, view_name: &str) -> String {
        self.database_join(&format!(
            "{}/_view/{}",
            design_path(design_doc),
            escape_segment(view_name)
        ))
    }

    /// URI for a couchdb-lucene search view.
    pub fn search_uri(&self, design_doc: &str, view_name: &str) -> String {
        self.database_join(&format!(
            "_fti/{}/{}",
            design_path(design_doc),
            escape_segment(view_name)
        ))
    }

    /// URI for a named attachment of a document. The revision, when known,
    /// travels as a query parameter.
    pub fn attachment_uri(&self, doc_id: &str, name: &str, rev: Option<&str>) -> String {
        let path = format!("{}/{}", escape_doc_id(doc_id), escape_segment(name));
        match rev {
            Some(rev) => self.database_join(&format!("{path}?rev={rev}")),
            None => self.database_join(&path),
        }
    }

    /// URI for database compaction.
    pub fn compact_uri(&self) -> String {
        self.database_join("_compact")
    }

    /// URI for triggering replication.
    pub fn replicate_uri(&self) -> String {
        self.database_join("_replicate")
    }

    /// URI listing all databases on the server.
    pub fn databases_uri(&self) -> String {
        self.root_join("_all_dbs")
    }

    /// URI for restarting the server.
    pub fn restart_uri(&self) -> String {
        self.root_join("_restart")
    }

    /// URI for fetching a batch of fresh UUIDs.
    pub fn uuids_uri(&self) -> String {
        self.root_join("_uuids")
    }
}

fn design_path(design_doc: &str) -> String {
    format!("_design/{}", escape_segment(design_doc))
}

fn escape_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

/// Escape a document id for use as a path segment. A literal `_design/`
/// prefix keeps its slash; everything after it is escaped.
pub fn escape_doc_id(doc_id: &str) -> String {
    match doc_id.strip_prefix("_design/") {
        Some(rest) => format!("_design/{}", escape_segment(rest)),
        None => escape_segment(doc_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("http://127.0.0.1:5984/mydb", "http://127.0.0.1:5984")
    }

    #[test]
    fn test_document_uri() {
        assert_eq!(
            endpoint().document_uri("doc-1", false),
            "http://127.0.0.1:5984/mydb/doc-1"
        );
    }

    #[test]
    fn test_document_uri_batch_marker() {
        assert_eq!(
            endpoint().document_uri("doc-1", true),
            "http://127.0.0.1:5984/mydb/doc-1?batch=ok"
        );
    }

    #[test]
    fn test_document_uri_escapes() {
        assert_eq!(
            endpoint().document_uri("a b/c", false),
            "http://127.0.0.1:5984/mydb/a%20b%2Fc"
        );
    }

    #[test]
    fn test_design_doc_id_keeps_prefix_slash() {
        assert_eq!(
            endpoint().document_uri("_design/my app", false),
            "http://127.0.0.1:5984/mydb/_design/my%20app"
        );
    }

    #[test]
    fn test_view_uri() {
        assert_eq!(
            endpoint().view_uri("blog", "by_date"),
            "http://127.0.0.1:5984/mydb/_design/blog/_view/by_date"
        );
    }

    #[test]
    fn test_search_uri() {
        assert_eq!(
            endpoint().search_uri("blog", "by_title"),
            "http://127.0.0.1:5984/mydb/_fti/_design/blog/by_title"
        );
    }

    #[test]
    fn test_attachment_uri_with_rev() {
        assert_eq!(
            endpoint().attachment_uri("doc-1", "photo.png", Some("2-x")),
            "http://127.0.0.1:5984/mydb/doc-1/photo.png?rev=2-x"
        );
    }

    #[test]
    fn test_attachment_uri_without_rev() {
        assert_eq!(
            endpoint().attachment_uri("doc-1", "photo.png", None),
            "http://127.0.0.1:5984/mydb/doc-1/photo.png"
        );
    }

    #[test]
    fn test_server_scoped_uris() {
        let e = endpoint();
        assert_eq!(e.uuids_uri(), "http://127.0.0.1:5984/_uuids");
        assert_eq!(e.databases_uri(), "http://127.0.0.1:5984/_all_dbs");
        assert_eq!(e.restart_uri(), "http://127.0.0.1:5984/_restart");
    }

    #[test]
    fn test_database_scoped_uris() {
        let e = endpoint();
        assert_eq!(e.documents_uri(), "http://127.0.0.1:5984/mydb/_all_docs");
        assert_eq!(e.bulk_docs_uri(), "http://127.0.0.1:5984/mydb/_bulk_docs");
        assert_eq!(e.compact_uri(), "http://127.0.0.1:5984/mydb/_compact");
        assert_eq!(e.replicate_uri(), "http://127.0.0.1:5984/mydb/_replicate");
    }
}
