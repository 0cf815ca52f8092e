//! Transport seam: one wire request in, one raw response out.
//!
//! [`Transport`] abstracts the HTTP stack so the rest of the client can be
//! exercised against a scripted implementation. [`NativeTransport`] is the
//! production implementation on top of `reqwest`.

use crate::client::config::ClientConfig;
use crate::error::{CouchError, Result};
use crate::types::CouchResponse;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP verbs the CouchDB protocol uses. `Copy` is the nonstandard verb
/// behind server-side document copies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Copy,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Copy => "COPY",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully prepared outbound request: the URL already carries any query
/// string, the body is already serialized.
#[derive(Clone, Debug)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl WireRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        WireRequest {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Abstraction over the HTTP stack.
///
/// Implementations execute exactly one exchange and must not retry; retry
/// policy belongs to the callers that own it.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Execute the request, returning the raw reply or
    /// [`CouchError::Transport`] when the exchange itself fails.
    async fn send(&self, request: WireRequest) -> Result<CouchResponse>;
}

/// Production transport backed by `reqwest`.
pub struct NativeTransport {
    client: reqwest::Client,
}

impl NativeTransport {
    /// Build a transport with the config's timeout and proxy applied.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                CouchError::InvalidArgument(format!("invalid proxy URL '{proxy_url}': {e}"))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| CouchError::Transport(e.to_string()))?;
        Ok(NativeTransport { client })
    }

    /// Wrap an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        NativeTransport { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for NativeTransport {
    async fn send(&self, request: WireRequest) -> Result<CouchResponse> {
        // COPY is not a predefined reqwest method.
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
            Method::Copy => reqwest::Method::from_bytes(b"COPY")
                .map_err(|e| CouchError::Transport(e.to_string()))?,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CouchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CouchError::Transport(e.to_string()))?;

        Ok(CouchResponse {
            status,
            headers,
            body,
        })
    }
}
