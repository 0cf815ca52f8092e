//! Raw HTTP response snapshot.

use bytes::Bytes;
use std::collections::BTreeMap;

/// One HTTP reply from the server: status, headers, and raw body.
///
/// Constructed once per request by the transport and discarded after the
/// connection has extracted its decoded content.
#[derive(Clone, Debug)]
pub struct CouchResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl CouchResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        CouchResponse {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Human-readable phrase for this response's status code.
    #[must_use]
    pub fn status_phrase(&self) -> &'static str {
        status_phrase(self.status)
    }

    /// Status line used in error diagnostics, e.g. `"(409): Conflict"`.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!("({}): {}", self.status, self.status_phrase())
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl Default for CouchResponse {
    fn default() -> Self {
        CouchResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Reason phrase for the status codes CouchDB replies with.
pub fn status_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "NoContent",
        206 => "PartialContent",
        301 => "MovedPermanently",
        302 => "Found",
        304 => "NotModified",
        400 => "BadRequest",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "NotFound",
        405 => "MethodNotAllowed",
        406 => "NotAcceptable",
        409 => "Conflict",
        410 => "Gone",
        412 => "PreconditionFailed",
        415 => "UnsupportedMediaType",
        416 => "RequestedRangeNotSatisfiable",
        417 => "ExpectationFailed",
        500 => "InternalServerError",
        501 => "NotImplemented",
        502 => "BadGateway",
        503 => "ServiceUnavailable",
        504 => "GatewayTimeOut",
        _ => "Unknown",
    }
}
