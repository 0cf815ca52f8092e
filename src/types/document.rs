//! Document representation.
//!
//! A CouchDB document is an arbitrary JSON object. The reserved fields the
//! client cares about are `_id` (unique within the database), `_rev` (the
//! opaque revision token the server assigns on every successful write),
//! `_deleted` (tombstone marker), and `_attachments`. Both identifiers and
//! revision tokens are echoed verbatim; the client never inspects their
//! structure.

use crate::error::CouchError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON document, keyed by field name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Document(Map::new())
    }

    /// Tombstone submitted through the bulk endpoint to delete a document.
    pub fn deletion_stub(id: impl Into<String>, rev: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("_id".into(), Value::String(id.into()));
        fields.insert("_rev".into(), Value::String(rev.into()));
        fields.insert("_deleted".into(), Value::Bool(true));
        Document(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("_id").and_then(Value::as_str)
    }

    pub fn rev(&self) -> Option<&str> {
        self.0.get("_rev").and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert("_id".into(), Value::String(id.into()));
    }

    pub fn set_rev(&mut self, rev: impl Into<String>) {
        self.0.insert("_rev".into(), Value::String(rev.into()));
    }

    pub fn is_deleted(&self) -> bool {
        self.0
            .get("_deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn has_attachments(&self) -> bool {
        self.0.contains_key("_attachments")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The document as a JSON value, for use as a request body.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Document(fields)
    }
}

impl TryFrom<Value> for Document {
    type Error = CouchError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Document(fields)),
            other => Err(CouchError::InvalidArgument(format!(
                "document must be a JSON object, got: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[test]
    fn test_id_and_rev_accessors() {
        let d = doc(json!({"_id": "a", "_rev": "1-x", "name": "senna"}));
        assert_eq!(d.id(), Some("a"));
        assert_eq!(d.rev(), Some("1-x"));
        assert_eq!(d.get("name"), Some(&json!("senna")));
    }

    #[test]
    fn test_missing_reserved_fields() {
        let d = doc(json!({"name": "senna"}));
        assert_eq!(d.id(), None);
        assert_eq!(d.rev(), None);
        assert!(!d.is_deleted());
    }

    #[test]
    fn test_set_id_and_rev() {
        let mut d = Document::new();
        d.set_id("a");
        d.set_rev("2-y");
        assert_eq!(d.id(), Some("a"));
        assert_eq!(d.rev(), Some("2-y"));
    }

    #[test]
    fn test_deletion_stub() {
        let d = Document::deletion_stub("a", "3-z");
        assert_eq!(d.id(), Some("a"));
        assert_eq!(d.rev(), Some("3-z"));
        assert!(d.is_deleted());
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn test_try_from_rejects_non_object() {
        assert!(Document::try_from(json!([1, 2])).is_err());
        assert!(Document::try_from(json!("str")).is_err());
    }

    #[test]
    fn test_serializes_transparently() {
        let d = doc(json!({"_id": "a", "n": 1}));
        let encoded = serde_json::to_value(&d).unwrap();
        assert_eq!(encoded, json!({"_id": "a", "n": 1}));
    }

    #[test]
    fn test_to_value_round_trip() {
        let d = doc(json!({"_id": "a"}));
        assert_eq!(Document::try_from(d.to_value()).unwrap(), d);
    }
}
