//! Schema-light document model
//!
//! Stored documents are open-world: a handful of well-known fields carry
//! constraints and defaults, and everything else passes through untouched.
//! Plain-mode query execution hydrates each result through this model;
//! the insert/replace passthroughs run the same field constraints against
//! raw documents before dispatch.

use bson::{oid::ObjectId, Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};

use atlas_bridge_common::{BridgeError, Result};

/// Allowed `status` values, in declaration order
pub const STATUS_VALUES: &[&str] = &["draft", "active", "archived"];

/// Status applied when a document carries none
pub const DEFAULT_STATUS: &str = "draft";

const MAX_TITLE_LENGTH: usize = 256;
const MAX_CATEGORY_LENGTH: usize = 128;

/// Typed view over one stored document
///
/// Unknown fields are preserved in `extra` and written back verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModel {
    pub id: Option<ObjectId>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub tags: Vec<String>,
    pub metadata: BsonDocument,
    pub created_at: Option<bson::DateTime>,
    pub updated_at: Option<bson::DateTime>,
    pub extra: BsonDocument,
}

impl Default for DocumentModel {
    fn default() -> Self {
        Self {
            id: None,
            title: None,
            category: None,
            status: DEFAULT_STATUS.to_string(),
            tags: Vec::new(),
            metadata: BsonDocument::new(),
            created_at: None,
            updated_at: None,
            extra: BsonDocument::new(),
        }
    }
}

impl DocumentModel {
    /// Builds a model from a stored document, applying defaults
    ///
    /// Missing status/tags/metadata take their defaults; title and category
    /// are trimmed. Fields outside the known set land in `extra`.
    ///
    /// # Errors
    /// Returns `BridgeError::Deserialization` when a known field carries an
    /// unexpected BSON type.
    pub fn from_document(mut doc: BsonDocument) -> Result<Self> {
        let id = match doc.remove("_id") {
            Some(Bson::ObjectId(oid)) => Some(oid),
            Some(other) => {
                // Non-ObjectId primary keys stay untyped.
                doc.insert("_id", other);
                None
            }
            None => None,
        };

        let mut model = Self {
            id,
            title: take_string(&mut doc, "title")?.map(|s| s.trim().to_string()),
            category: take_string(&mut doc, "category")?.map(|s| s.trim().to_string()),
            status: take_string(&mut doc, "status")?.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            tags: take_string_array(&mut doc, "tags")?.unwrap_or_default(),
            metadata: take_document(&mut doc, "metadata")?.unwrap_or_default(),
            created_at: take_datetime(&mut doc, "createdAt")?,
            updated_at: take_datetime(&mut doc, "updatedAt")?,
            extra: BsonDocument::new(),
        };
        model.extra = doc;
        Ok(model)
    }

    /// Serializes the model back into a wire document
    pub fn into_document(self) -> BsonDocument {
        let mut doc = BsonDocument::new();
        if let Some(id) = self.id {
            doc.insert("_id", id);
        }
        if let Some(title) = self.title {
            doc.insert("title", title);
        }
        if let Some(category) = self.category {
            doc.insert("category", category);
        }
        doc.insert("status", self.status);
        doc.insert("tags", self.tags);
        doc.insert("metadata", self.metadata);
        if let Some(created_at) = self.created_at {
            doc.insert("createdAt", created_at);
        }
        if let Some(updated_at) = self.updated_at {
            doc.insert("updatedAt", updated_at);
        }
        for (key, value) in self.extra {
            doc.insert(key, value);
        }
        doc
    }

    /// Checks the field constraints
    ///
    /// # Errors
    /// Returns a `BadRequest`-tagged error on the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(category) = &self.category {
            check_category(category)?;
        }
        check_status(&self.status)
    }

    /// Stamps `updated_at`, and `created_at` on first call
    pub fn touch(&mut self) {
        let now = bson::DateTime::now();
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }

    /// Creation timestamp as a chrono UTC datetime
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.map(|dt| dt.to_chrono())
    }

    /// Update timestamp as a chrono UTC datetime
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        self.updated_at.map(|dt| dt.to_chrono())
    }
}

/// Passes a raw document through the model, applying defaults
pub(crate) fn hydrate(doc: BsonDocument) -> Result<BsonDocument> {
    DocumentModel::from_document(doc).map(DocumentModel::into_document)
}

/// Checks the schema-light constraints on a raw document before a write
///
/// Known fields must carry the expected type and bounds when present;
/// everything else passes. Null counts as absent.
///
/// # Errors
/// Returns a `BadRequest`-tagged error on the first violated constraint.
pub fn validate_document_fields(doc: &BsonDocument) -> Result<()> {
    if let Some(title) = get_present(doc, "title") {
        let Bson::String(title) = title else {
            return Err(expected_type("title", "string", title));
        };
        check_title(title)?;
    }

    if let Some(category) = get_present(doc, "category") {
        let Bson::String(category) = category else {
            return Err(expected_type("category", "string", category));
        };
        check_category(category)?;
    }

    if let Some(status) = get_present(doc, "status") {
        let Bson::String(status) = status else {
            return Err(expected_type("status", "string", status));
        };
        check_status(status)?;
    }

    if let Some(tags) = get_present(doc, "tags") {
        let Bson::Array(tags) = tags else {
            return Err(expected_type("tags", "array", tags));
        };
        if !tags.iter().all(|tag| matches!(tag, Bson::String(_))) {
            return Err(BridgeError::BadRequest(
                "Field 'tags' must be an array of strings".to_string(),
            ));
        }
    }

    if let Some(metadata) = get_present(doc, "metadata") {
        if !matches!(metadata, Bson::Document(_)) {
            return Err(expected_type("metadata", "object", metadata));
        }
    }

    Ok(())
}

fn check_title(title: &str) -> Result<()> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(BridgeError::BadRequest(format!(
            "Field 'title' must not exceed {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn check_category(category: &str) -> Result<()> {
    if category.chars().count() > MAX_CATEGORY_LENGTH {
        return Err(BridgeError::BadRequest(format!(
            "Field 'category' must not exceed {} characters",
            MAX_CATEGORY_LENGTH
        )));
    }
    Ok(())
}

fn check_status(status: &str) -> Result<()> {
    if !STATUS_VALUES.contains(&status) {
        return Err(BridgeError::BadRequest(format!(
            "Field 'status' must be one of: {}",
            STATUS_VALUES.join(", ")
        )));
    }
    Ok(())
}

fn get_present<'a>(doc: &'a BsonDocument, key: &str) -> Option<&'a Bson> {
    doc.get(key).filter(|value| !matches!(value, Bson::Null))
}

fn take_string(doc: &mut BsonDocument, key: &str) -> Result<Option<String>> {
    match doc.remove(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::String(value)) => Ok(Some(value)),
        Some(other) => Err(deserialization_mismatch(key, "string", &other)),
    }
}

fn take_string_array(doc: &mut BsonDocument, key: &str) -> Result<Option<Vec<String>>> {
    match doc.remove(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Bson::String(value) => Ok(value),
                other => Err(deserialization_mismatch(key, "array of strings", &other)),
            })
            .collect::<Result<Vec<String>>>()
            .map(Some),
        Some(other) => Err(deserialization_mismatch(key, "array of strings", &other)),
    }
}

fn take_document(doc: &mut BsonDocument, key: &str) -> Result<Option<BsonDocument>> {
    match doc.remove(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Document(value)) => Ok(Some(value)),
        Some(other) => Err(deserialization_mismatch(key, "object", &other)),
    }
}

fn take_datetime(doc: &mut BsonDocument, key: &str) -> Result<Option<bson::DateTime>> {
    match doc.remove(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::DateTime(value)) => Ok(Some(value)),
        Some(other) => Err(deserialization_mismatch(key, "datetime", &other)),
    }
}

fn expected_type(field: &str, expected: &str, got: &Bson) -> BridgeError {
    BridgeError::BadRequest(format!(
        "Field '{}' must be a {}, got {}",
        field,
        expected,
        bson_type_name(got)
    ))
}

fn deserialization_mismatch(field: &str, expected: &str, got: &Bson) -> BridgeError {
    BridgeError::Deserialization(format!(
        "field '{}' expected {}, got {}",
        field,
        expected,
        bson_type_name(got)
    ))
}

fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::Int32(_) => "int32",
        Bson::Int64(_) => "int64",
        Bson::ObjectId(_) => "objectid",
        Bson::DateTime(_) => "datetime",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_hydration_applies_defaults() {
        let model = DocumentModel::from_document(doc! { "title": "  Quarterly report  " }).unwrap();
        assert_eq!(model.title.as_deref(), Some("Quarterly report"));
        assert_eq!(model.status, DEFAULT_STATUS);
        assert!(model.tags.is_empty());
        assert!(model.metadata.is_empty());
        assert!(model.id.is_none());
    }

    #[test]
    fn test_hydrate_preserves_unknown_fields() {
        let hydrated = hydrate(doc! { "custom": 42, "title": "x" }).unwrap();
        assert_eq!(hydrated.get_i32("custom").ok(), Some(42));
        assert_eq!(hydrated.get_str("status").ok(), Some(DEFAULT_STATUS));
        assert!(hydrated.get_array("tags").unwrap().is_empty());
    }

    #[test]
    fn test_hydration_keeps_object_id() {
        let id = ObjectId::new();
        let model = DocumentModel::from_document(doc! { "_id": id, "status": "active" }).unwrap();
        assert_eq!(model.id, Some(id));
        assert_eq!(model.status, "active");

        let doc = model.into_document();
        assert_eq!(doc.get_object_id("_id").ok(), Some(id));
    }

    #[test]
    fn test_hydration_rejects_mistyped_tags() {
        let err = DocumentModel::from_document(doc! { "tags": ["a", 1] }).unwrap_err();
        assert!(matches!(err, BridgeError::Deserialization(_)));
    }

    #[test]
    fn test_validate_rejects_long_title() {
        let model = DocumentModel {
            title: Some("t".repeat(MAX_TITLE_LENGTH + 1)),
            ..DocumentModel::default()
        };
        assert!(model.validate().unwrap_err().is_bad_request());
    }

    #[test]
    fn test_validate_rejects_unknown_status() {
        let model = DocumentModel {
            status: "published".to_string(),
            ..DocumentModel::default()
        };
        let err = model.validate().unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("draft, active, archived"));
    }

    #[test]
    fn test_validate_document_fields_accepts_open_world() {
        let doc = doc! {
            "title": "ok",
            "status": "archived",
            "tags": ["a", "b"],
            "metadata": { "source": "import" },
            "anything": [1, 2, 3],
        };
        assert!(validate_document_fields(&doc).is_ok());
    }

    #[test]
    fn test_validate_document_fields_treats_null_as_absent() {
        let doc = doc! { "title": Bson::Null, "status": Bson::Null };
        assert!(validate_document_fields(&doc).is_ok());
    }

    #[test]
    fn test_validate_document_fields_rejects_bad_shapes() {
        assert!(validate_document_fields(&doc! { "title": 7 })
            .unwrap_err()
            .is_bad_request());
        assert!(validate_document_fields(&doc! { "status": "published" })
            .unwrap_err()
            .is_bad_request());
        assert!(validate_document_fields(&doc! { "tags": "not-an-array" })
            .unwrap_err()
            .is_bad_request());
        assert!(validate_document_fields(&doc! { "tags": ["ok", 3] })
            .unwrap_err()
            .is_bad_request());
        assert!(validate_document_fields(&doc! { "metadata": "inline" })
            .unwrap_err()
            .is_bad_request());
        let long_category = "c".repeat(MAX_CATEGORY_LENGTH + 1);
        assert!(validate_document_fields(&doc! { "category": long_category })
            .unwrap_err()
            .is_bad_request());
    }

    #[test]
    fn test_touch_stamps_timestamps() {
        let mut model = DocumentModel::default();
        assert!(model.created_at_utc().is_none());

        model.touch();
        let created = model.created_at.unwrap();
        assert!(model.updated_at.is_some());
        assert!(model.created_at_utc().is_some());

        model.touch();
        assert_eq!(model.created_at.unwrap(), created);
    }
}
