//! Error types for CouchDB client operations.
//!
//! Every failure surfaces as a [`CouchError`] variant; the [`Result`] type
//! alias provides a convenient shorthand for operations that may fail.
//!
//! # Error Categories
//!
//! | Category | Variants | Source |
//! |----------|----------|--------|
//! | Server status | `Unauthorized`, `NotFound`, `Conflict`, `ServerError`, `Unavailable`, `Request` | Non-2xx HTTP replies |
//! | Payload | `Decode` | Malformed JSON response body |
//! | Network | `Transport` | Connection/request failure |
//! | Caller | `InvalidArgument`, `NotConfigured` | Precondition violated before any request |
//!
//! Server-status errors carry the status line (`"(409): Conflict"`) and, when
//! the server sent one, the response body text. Only [`CouchError::Conflict`]
//! is ever retried, and only by the document update loop.

use thiserror::Error;

/// Result type for CouchDB client operations.
pub type Result<T> = std::result::Result<T, CouchError>;

/// Errors that can occur while talking to a CouchDB server.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CouchError {
    /// The server rejected the request's credentials (HTTP 401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested database, document, or attachment does not exist
    /// (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// A write carried a revision token that is no longer current
    /// (HTTP 409). The caller holds stale state and must re-read the
    /// document before writing again.
    #[error("document update conflict: {0}")]
    Conflict(String),

    /// CouchDB reported an internal failure (HTTP 500).
    #[error("CouchDB server error: {0}")]
    ServerError(String),

    /// The server or an intermediary is temporarily unable to answer
    /// (HTTP 502/503).
    #[error("CouchDB unavailable: {0}")]
    Unavailable(String),

    /// Any other non-2xx reply.
    #[error("request failed ({status}): {description}")]
    Request {
        /// HTTP status code of the reply.
        status: u16,
        /// Status line plus response body, when present.
        description: String,
    },

    /// The response body was not valid JSON. Carries the raw body text.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The underlying HTTP request could not be completed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A caller precondition was violated before any request was issued,
    /// e.g. deleting a document without a revision.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No database has been configured on the client.
    #[error("no CouchDB database configured")]
    NotConfigured,
}

impl CouchError {
    /// Map a non-2xx HTTP status onto the matching error variant.
    ///
    /// `description` should be the status line, optionally followed by the
    /// response body.
    pub fn from_status(status: u16, description: String) -> Self {
        match status {
            401 => CouchError::Unauthorized(description),
            404 => CouchError::NotFound(description),
            409 => CouchError::Conflict(description),
            500 => CouchError::ServerError(description),
            502 | 503 => CouchError::Unavailable(description),
            _ => CouchError::Request {
                status,
                description,
            },
        }
    }

    /// HTTP status code behind this error, when it came from a reply.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CouchError::Unauthorized(_) => Some(401),
            CouchError::NotFound(_) => Some(404),
            CouchError::Conflict(_) => Some(409),
            CouchError::ServerError(_) => Some(500),
            CouchError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a revision conflict (HTTP 409).
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, CouchError::Conflict(_))
    }

    /// True when the target did not exist (HTTP 404).
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CouchError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_401() {
        let err = CouchError::from_status(401, "(401): Unauthorized".into());
        assert!(matches!(err, CouchError::Unauthorized(_)));
        assert_eq!(err.status_code(), Some(401));
    }

    #[test]
    fn test_from_status_404() {
        let err = CouchError::from_status(404, "(404): NotFound".into());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_status_409() {
        let err = CouchError::from_status(409, "(409): Conflict".into());
        assert!(err.is_conflict());
    }

    #[test]
    fn test_from_status_500() {
        let err = CouchError::from_status(500, "(500): InternalServerError".into());
        assert!(matches!(err, CouchError::ServerError(_)));
    }

    #[test]
    fn test_from_status_gateway_codes() {
        assert!(matches!(
            CouchError::from_status(502, "(502): BadGateway".into()),
            CouchError::Unavailable(_)
        ));
        assert!(matches!(
            CouchError::from_status(503, "(503): ServiceUnavailable".into()),
            CouchError::Unavailable(_)
        ));
    }

    #[test]
    fn test_from_status_other_is_generic() {
        let err = CouchError::from_status(412, "(412): PreconditionFailed".into());
        assert!(matches!(err, CouchError::Request { status: 412, .. }));
        assert_eq!(err.status_code(), Some(412));
    }

    #[test]
    fn test_transport_has_no_status() {
        let err = CouchError::Transport("connection refused".into());
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_error_display() {
        let err = CouchError::Conflict("(409): Conflict - stale rev".into());
        assert!(err.to_string().contains("conflict"));
        assert!(err.to_string().contains("stale rev"));
    }

    #[test]
    fn test_not_configured_display() {
        let err = CouchError::NotConfigured;
        assert!(err.to_string().contains("no CouchDB database"));
    }
}
