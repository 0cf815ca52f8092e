//! Inline attachment encoding.

use crate::types::Document;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

/// Base64-encode the `data` of every inline attachment on `doc`.
///
/// Attachments marked `stub` are server-side references and are left
/// untouched. Runs before a save so the wire body is valid JSON.
pub fn encode_attachments(doc: &mut Document) {
    let Some(Value::Object(attachments)) = doc.get_mut("_attachments") else {
        return;
    };

    for attachment in attachments.values_mut() {
        let Value::Object(fields) = attachment else {
            continue;
        };
        if fields.get("stub").and_then(Value::as_bool).unwrap_or(false) {
            continue;
        }
        if let Some(Value::String(data)) = fields.get("data") {
            let encoded = BASE64.encode(data.as_bytes());
            fields.insert("data".to_string(), Value::String(encoded));
        }
    }
}
