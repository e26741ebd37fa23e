//! Input validation for mutation passthroughs
//!
//! Route handlers hand this layer loosely-typed JSON. Every
//! filter/update/replacement/options argument must be a plain JSON object;
//! arrays, primitives and null are rejected with a `BadRequest`-tagged error
//! *before* anything is dispatched to the store, so callers can map the
//! failure to a client-fault response without guessing.

use bson::{doc, Document as BsonDocument};
use serde_json::Value as JsonValue;

use atlas_bridge_common::{BridgeError, Result};

/// Recognized per-operation write options
///
/// Only `upsert` is forwarded to the driver; other keys pass shape
/// validation but are not interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub upsert: Option<bool>,
}

/// Validates that a mandatory argument is a plain JSON object
///
/// # Errors
/// Returns `BridgeError::BadRequest` naming the offending field when the
/// value is an array, a primitive, or null.
pub fn require_document(value: &JsonValue, field: &str) -> Result<BsonDocument> {
    match value {
        JsonValue::Object(_) => json_to_document(value, field),
        _ => Err(bad_shape(field)),
    }
}

/// Validates an optional argument the same way as [`require_document`]
pub fn optional_document(value: Option<&JsonValue>, field: &str) -> Result<Option<BsonDocument>> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => require_document(value, field).map(Some),
    }
}

/// Validates a non-empty array of plain JSON objects
///
/// Used for bulk inserts and aggregation pipelines: every element must be
/// an object, and an empty array is rejected.
pub fn require_document_array(value: &JsonValue, field: &str) -> Result<Vec<BsonDocument>> {
    let JsonValue::Array(items) = value else {
        return Err(BridgeError::BadRequest(format!(
            "Field '{}' must be a non-empty array of documents",
            field
        )));
    };
    if items.is_empty() {
        return Err(BridgeError::BadRequest(format!(
            "Field '{}' must contain at least one document",
            field
        )));
    }
    items
        .iter()
        .map(|item| require_document(item, field))
        .collect()
}

/// Parses recognized write options from an optional JSON object
pub fn parse_write_options(value: Option<&JsonValue>, field: &str) -> Result<WriteOptions> {
    let Some(options) = optional_document_map(value, field)? else {
        return Ok(WriteOptions::default());
    };
    let upsert = match options.get("upsert") {
        None => None,
        Some(JsonValue::Bool(flag)) => Some(*flag),
        Some(_) => {
            return Err(BridgeError::BadRequest(format!(
                "Option 'upsert' in '{}' must be a boolean",
                field
            )))
        }
    };
    Ok(WriteOptions { upsert })
}

/// Wraps operator-free update documents in `$set`
///
/// An update whose top-level keys carry no `$` operator would be rejected by
/// the store as a replacement; treating it as a field update matches what
/// callers mean.
pub fn ensure_update_operators(update: BsonDocument) -> BsonDocument {
    if update.keys().any(|key| key.starts_with('$')) {
        update
    } else {
        doc! { "$set": update }
    }
}

fn optional_document_map<'a>(
    value: Option<&'a JsonValue>,
    field: &str,
) -> Result<Option<&'a serde_json::Map<String, JsonValue>>> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Object(map)) => Ok(Some(map)),
        Some(_) => Err(bad_shape(field)),
    }
}

fn json_to_document(value: &JsonValue, field: &str) -> Result<BsonDocument> {
    bson::to_document(value).map_err(|e| {
        BridgeError::BadRequest(format!("Field '{}' is not a valid document: {}", field, e))
    })
}

fn bad_shape(field: &str) -> BridgeError {
    BridgeError::BadRequest(format!(
        "Field '{}' is required and must be an object",
        field
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_document_accepts_object() {
        let doc = require_document(&json!({"a": 1}), "filter").unwrap();
        assert_eq!(doc.get_i64("a").ok(), Some(1));
    }

    #[test]
    fn test_require_document_rejects_array() {
        let err = require_document(&json!([]), "filter").unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("filter"));
    }

    #[test]
    fn test_require_document_rejects_primitives() {
        for value in [json!(1), json!("text"), json!(true), json!(null)] {
            let err = require_document(&value, "update").unwrap_err();
            assert!(err.is_bad_request());
        }
    }

    #[test]
    fn test_optional_document_absent_and_null() {
        assert_eq!(optional_document(None, "options").unwrap(), None);
        assert_eq!(optional_document(Some(&json!(null)), "options").unwrap(), None);
    }

    #[test]
    fn test_optional_document_rejects_array() {
        let value = json!([{"upsert": true}]);
        assert!(optional_document(Some(&value), "options")
            .unwrap_err()
            .is_bad_request());
    }

    #[test]
    fn test_require_document_array_rejects_empty() {
        let err = require_document_array(&json!([]), "documents").unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_require_document_array_rejects_non_object_item() {
        let err = require_document_array(&json!([{"a": 1}, 2]), "documents").unwrap_err();
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_require_document_array_converts_items() {
        let docs = require_document_array(&json!([{"a": 1}, {"b": 2}]), "documents").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get_i64("b").ok(), Some(2));
    }

    #[test]
    fn test_parse_write_options_defaults() {
        let options = parse_write_options(None, "options").unwrap();
        assert_eq!(options, WriteOptions::default());
    }

    #[test]
    fn test_parse_write_options_reads_upsert() {
        let value = json!({"upsert": true});
        let options = parse_write_options(Some(&value), "options").unwrap();
        assert_eq!(options.upsert, Some(true));
    }

    #[test]
    fn test_parse_write_options_rejects_bad_upsert() {
        let value = json!({"upsert": "yes"});
        assert!(parse_write_options(Some(&value), "options")
            .unwrap_err()
            .is_bad_request());
    }

    #[test]
    fn test_parse_write_options_rejects_array_shape() {
        let value = json!(["upsert"]);
        assert!(parse_write_options(Some(&value), "options")
            .unwrap_err()
            .is_bad_request());
    }

    #[test]
    fn test_ensure_update_operators_wraps_plain_document() {
        let wrapped = ensure_update_operators(doc! { "status": "active" });
        assert!(wrapped.contains_key("$set"));
        assert_eq!(
            wrapped
                .get_document("$set")
                .unwrap()
                .get_str("status")
                .unwrap(),
            "active"
        );
    }

    #[test]
    fn test_ensure_update_operators_keeps_operator_document() {
        let update = doc! { "$inc": { "views": 1 } };
        let kept = ensure_update_operators(update.clone());
        assert_eq!(kept, update);
    }
}
