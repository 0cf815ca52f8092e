//! Request/response pipeline.
//!
//! [`Connection`] drives one HTTP verb against one endpoint URI: it builds
//! the wire request (query string for GET/DELETE, JSON body for POST/PUT,
//! `Destination` header for COPY), hands it to the [`Transport`], maps
//! non-2xx replies onto typed errors, and decodes the JSON body of
//! successful replies. Callers never see decoded content from a failed
//! request.

use crate::client::config::ClientConfig;
use crate::client::transport::{Method, Transport, WireRequest};
use crate::error::{CouchError, Result};
use crate::types::{CouchResponse, Query};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

enum Payload<'a> {
    None,
    Query(&'a Query),
    Json(&'a Value),
    Destination(&'a str),
}

/// Executes individual HTTP exchanges against the server.
#[derive(Clone)]
pub struct Connection {
    transport: Arc<dyn Transport>,
    headers: BTreeMap<String, String>,
    debug: bool,
}

impl Connection {
    /// Build a connection with the standing headers derived from `config`.
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "User-Agent".to_string(),
            format!("davenport v{}", env!("CARGO_PKG_VERSION")),
        );
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        if let Some(username) = &config.username {
            let password = config.password.as_deref().unwrap_or("");
            let token = BASE64.encode(format!("{username}:{password}"));
            headers.insert("Authorization".to_string(), format!("Basic {token}"));
        }

        Connection {
            transport,
            headers,
            debug: config.debug,
        }
    }

    pub async fn get(&self, endpoint: &str, query: Option<&Query>) -> Result<Value> {
        self.request(Method::Get, endpoint, query_payload(query))
            .await
    }

    pub async fn delete(&self, endpoint: &str, query: Option<&Query>) -> Result<Value> {
        self.request(Method::Delete, endpoint, query_payload(query))
            .await
    }

    pub async fn post(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::Post, endpoint, json_payload(body))
            .await
    }

    pub async fn put(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::Put, endpoint, json_payload(body)).await
    }

    pub async fn copy(&self, endpoint: &str, destination: &str) -> Result<Value> {
        self.request(Method::Copy, endpoint, Payload::Destination(destination))
            .await
    }

    /// GET returning the raw body, for non-JSON resources like attachments.
    pub async fn get_raw(&self, endpoint: &str, query: Option<&Query>) -> Result<Bytes> {
        let response = self
            .execute(Method::Get, endpoint, query_payload(query))
            .await?;
        Ok(response.body)
    }

    async fn request(&self, method: Method, endpoint: &str, payload: Payload<'_>) -> Result<Value> {
        let response = self.execute(method, endpoint, payload).await?;
        decode_body(&response)
    }

    /// Build the wire request, send it, and map non-2xx replies to errors.
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        payload: Payload<'_>,
    ) -> Result<CouchResponse> {
        let mut request = WireRequest::new(method, endpoint);
        request.headers = self.headers.clone();

        match payload {
            Payload::None => {}
            Payload::Query(query) => {
                if !query.is_empty() {
                    request.url = format!("{}?{}", request.url, query.encode());
                }
            }
            Payload::Json(value) => {
                let body = serde_json::to_vec(value)
                    .map_err(|e| CouchError::Decode(format!("could not encode body: {e}")))?;
                request.body = Bytes::from(body);
            }
            Payload::Destination(destination) => {
                request
                    .headers
                    .insert("Destination".to_string(), destination.to_string());
            }
        }

        if self.debug {
            tracing::debug!("request: {} {}", request.method, request.url);
            for (name, value) in &request.headers {
                tracing::debug!("{name}={value}");
            }
        }

        let response = self.transport.send(request).await?;

        if self.debug {
            tracing::debug!("response: {}", response.status);
            for (name, value) in &response.headers {
                tracing::debug!("{name}={value}");
            }
            tracing::debug!("body: {}", response.body_str().unwrap_or("<non-utf8>"));
        }

        raise_errors(response)
    }
}

fn query_payload(query: Option<&Query>) -> Payload<'_> {
    match query {
        Some(query) => Payload::Query(query),
        None => Payload::None,
    }
}

fn json_payload(body: Option<&Value>) -> Payload<'_> {
    match body {
        Some(body) => Payload::Json(body),
        None => Payload::None,
    }
}

/// Map a non-2xx reply onto the matching error, carrying the status line
/// and body text. Runs before any decoding so a failed request can never
/// surface partial content.
fn raise_errors(response: CouchResponse) -> Result<CouchResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let mut description = response.status_line();
    if let Some(body) = response.body_str() {
        if !body.is_empty() {
            description = format!("{description} - {body}");
        }
    }

    Err(CouchError::from_status(response.status, description))
}

fn decode_body(response: &CouchResponse) -> Result<Value> {
    if response.body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&response.body).map_err(|_| {
        CouchError::Decode(format!(
            "content: <{}>",
            response.body_str().unwrap_or("<non-utf8>")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted queue of responses and logs every request.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<CouchResponse>>,
        requests: Mutex<Vec<WireRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<CouchResponse>) -> Arc<Self> {
            Arc::new(ScriptedTransport {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<WireRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: WireRequest) -> Result<CouchResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| CouchError::Transport("no scripted response".into()))
        }
    }

    fn connection(responses: Vec<CouchResponse>) -> (Connection, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new(responses);
        let config = ClientConfig::parse("testdb").unwrap();
        (Connection::new(transport.clone(), &config), transport)
    }

    fn ok_json(value: Value) -> CouchResponse {
        CouchResponse::new(200, value.to_string())
    }

    #[tokio::test]
    async fn test_get_appends_query_in_order() {
        let (conn, transport) = connection(vec![ok_json(json!({}))]);
        let query = Query::new().with("rev", "1-x").with("count", 3);
        conn.get("http://h/db/doc", Some(&query)).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].url, "http://h/db/doc?rev=1-x&count=3");
        assert_eq!(sent[0].method, Method::Get);
        assert!(sent[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_get_without_query_leaves_url_alone() {
        let (conn, transport) = connection(vec![ok_json(json!({}))]);
        conn.get("http://h/db/doc", None).await.unwrap();
        assert_eq!(transport.sent()[0].url, "http://h/db/doc");
    }

    #[tokio::test]
    async fn test_put_serializes_body() {
        let (conn, transport) = connection(vec![ok_json(json!({"ok": true}))]);
        let body = json!({"_id": "a", "n": 1});
        conn.put("http://h/db/a", Some(&body)).await.unwrap();

        let sent = transport.sent();
        let decoded: Value = serde_json::from_slice(&sent[0].body).unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn test_copy_sets_destination_header_and_empty_body() {
        let (conn, transport) = connection(vec![ok_json(json!({"ok": true}))]);
        conn.copy("http://h/db/a", "b?rev=2-x").await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].method, Method::Copy);
        assert_eq!(
            sent[0].headers.get("Destination").map(String::as_str),
            Some("b?rev=2-x")
        );
        assert!(sent[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_standing_headers_present() {
        let (conn, transport) = connection(vec![ok_json(json!({}))]);
        conn.get("http://h/db", None).await.unwrap();

        let headers = &transport.sent()[0].headers;
        assert_eq!(
            headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
        assert!(headers
            .get("User-Agent")
            .is_some_and(|ua| ua.starts_with("davenport v")));
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let transport = ScriptedTransport::new(vec![ok_json(json!({}))]);
        let config = ClientConfig::parse("testdb")
            .unwrap()
            .with_credentials("admin", "secret");
        let conn = Connection::new(transport.clone(), &config);
        conn.get("http://h/db", None).await.unwrap();

        let headers = &transport.sent()[0].headers;
        // base64("admin:secret")
        assert_eq!(
            headers.get("Authorization").map(String::as_str),
            Some("Basic YWRtaW46c2VjcmV0")
        );
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let cases: Vec<(u16, fn(&CouchError) -> bool)> = vec![
            (401, |e| matches!(e, CouchError::Unauthorized(_))),
            (404, |e| e.is_not_found()),
            (409, |e| e.is_conflict()),
            (500, |e| matches!(e, CouchError::ServerError(_))),
            (502, |e| matches!(e, CouchError::Unavailable(_))),
            (503, |e| matches!(e, CouchError::Unavailable(_))),
            (412, |e| matches!(e, CouchError::Request { status: 412, .. })),
        ];
        for (status, check) in cases {
            let (conn, _) = connection(vec![CouchResponse::new(status, "")]);
            let err = conn.get("http://h/db/doc", None).await.unwrap_err();
            assert!(check(&err), "status {status} mapped to {err:?}");
        }
    }

    #[tokio::test]
    async fn test_error_carries_status_line_and_body() {
        let (conn, _) = connection(vec![CouchResponse::new(
            404,
            r#"{"error":"not_found","reason":"missing"}"#,
        )]);
        let err = conn.get("http://h/db/doc", None).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("(404): NotFound"));
        assert!(message.contains("missing"));
    }

    #[tokio::test]
    async fn test_failed_request_never_decodes() {
        // A 404 with a malformed body is still NotFound, not Decode.
        let (conn, _) = connection(vec![CouchResponse::new(404, "<html>gone</html>")]);
        let err = conn.get("http://h/db/doc", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_decode_error_carries_raw_body() {
        let (conn, _) = connection(vec![CouchResponse::new(200, "not json")]);
        let err = conn.get("http://h/db/doc", None).await.unwrap_err();
        match err {
            CouchError::Decode(message) => assert!(message.contains("not json")),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body_decodes_to_null() {
        let (conn, _) = connection(vec![CouchResponse::new(200, "")]);
        let content = conn.get("http://h/db/doc", None).await.unwrap();
        assert_eq!(content, Value::Null);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let (conn, _) = connection(vec![]);
        let err = conn.get("http://h/db/doc", None).await.unwrap_err();
        assert!(matches!(err, CouchError::Transport(_)));
    }

    #[tokio::test]
    async fn test_get_raw_returns_bytes() {
        let (conn, _) = connection(vec![CouchResponse::new(200, vec![0xde, 0xad])]);
        let body = conn.get_raw("http://h/db/doc/att", None).await.unwrap();
        assert_eq!(&body[..], &[0xde, 0xad]);
    }

    #[tokio::test]
    async fn test_get_raw_still_maps_errors() {
        let (conn, _) = connection(vec![CouchResponse::new(404, "")]);
        let err = conn.get_raw("http://h/db/doc/att", None).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
