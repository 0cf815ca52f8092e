//! Shared test fixtures: a scripted transport that answers from a handler
//! and records every request it sees.

use async_trait::async_trait;
use davenport::{
    ClientConfig, CouchClient, CouchError, CouchResponse, Result, Transport, WireRequest,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Handler = Box<dyn Fn(&WireRequest) -> Result<CouchResponse> + Send + Sync>;

pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<WireRequest>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&WireRequest) -> Result<CouchResponse> + Send + Sync + 'static,
    {
        Arc::new(MockTransport {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A transport that fails every request; for asserting no request is
    /// issued at all.
    pub fn refusing() -> Arc<Self> {
        Self::new(|req| {
            Err(CouchError::Transport(format!(
                "unexpected request: {} {}",
                req.method, req.url
            )))
        })
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: WireRequest) -> Result<CouchResponse> {
        let response = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

pub fn json_response(status: u16, value: Value) -> CouchResponse {
    CouchResponse::new(status, value.to_string())
}

/// A client for the `testdb` database wired to the given transport.
pub fn client_with(transport: Arc<MockTransport>) -> CouchClient {
    let config = ClientConfig::parse("testdb").unwrap();
    CouchClient::with_transport(config, transport)
}

/// Same, with a small UUID refill batch to keep fixtures readable.
pub fn client_with_uuid_batch(transport: Arc<MockTransport>, batch: usize) -> CouchClient {
    let config = ClientConfig::parse("testdb")
        .unwrap()
        .with_uuid_batch_count(batch);
    CouchClient::with_transport(config, transport)
}

/// Decode a recorded request body as JSON.
pub fn body_json(request: &WireRequest) -> Value {
    serde_json::from_slice(&request.body).expect("request body is JSON")
}
