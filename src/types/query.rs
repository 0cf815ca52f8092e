//! Query-string parameters and per-operation option structs.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

/// Characters left bare in encoded query values: the RFC 3986 unreserved set.
const VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Ordered query-string parameters.
///
/// Pairs are emitted in insertion order as `key=urlencoded(value)` joined
/// by `&`. Keys are taken verbatim; values are percent-encoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Query(Vec::new())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode as a query string, preserving insertion order.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| {
                format!("{}={}", key, utf8_percent_encode(value, VALUE_ENCODE_SET))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Query(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

/// Parameters for a view query.
///
/// An explicit `keys` list switches the request from GET to POST with a
/// `{"keys": [...]}` body, sidestepping URL length limits; the remaining
/// parameters always travel in the query string.
#[derive(Clone, Debug, Default)]
pub struct ViewParams {
    pub keys: Option<Vec<Value>>,
    pub query: Query,
}

impl ViewParams {
    pub fn new() -> Self {
        ViewParams::default()
    }

    #[must_use]
    pub fn with_keys(mut self, keys: Vec<Value>) -> Self {
        self.keys = Some(keys);
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push(key, value);
        self
    }
}
