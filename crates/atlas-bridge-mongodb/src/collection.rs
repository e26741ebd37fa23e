//! Collection routing, caching, and bulk mutation passthroughs
//!
//! A configured collection target may be dotted (`"analytics.reports"`) to
//! select a collection in a different database, multiplexed over the same
//! client connection. Resolved handles are memoized per
//! `(database, collection)` key and evicted when the owning manager closes.

use bson::{Bson, Document as BsonDocument};
use futures::TryStreamExt;
use mongodb::options::{ReplaceOptions, UpdateOptions};
use mongodb::Collection;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use atlas_bridge_common::Result;

use crate::config::DEFAULT_COLLECTION;
use crate::connection::ConnectionManager;
use crate::document;
use crate::query::QueryBuilder;
use crate::validation;

/// Composite cache key for a resolved collection
///
/// An explicit `(database, collection)` pair: two collections with the same
/// name in different databases never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    database: String,
    collection: String,
}

impl CollectionKey {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl std::fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Splits a configured collection target into its routing parts
///
/// - `None` targets the default collection on the active database.
/// - A plain name targets the active database.
/// - `"<db>.<rest>"` selects a different database; the remainder, with any
///   further dots preserved, is the collection name. A trailing-dot target
///   with nothing after the separator falls back to the whole string on the
///   active database.
pub fn split_collection_target<'a>(configured: Option<&'a str>) -> (Option<&'a str>, &'a str) {
    let Some(configured) = configured else {
        return (None, DEFAULT_COLLECTION);
    };
    match configured.split_once('.') {
        Some((database, rest)) if !rest.is_empty() => (Some(database), rest),
        _ => (None, configured),
    }
}

/// Cached handle over one resolved collection
#[derive(Clone, Debug)]
pub struct CollectionHandle {
    key: CollectionKey,
    collection: Collection<BsonDocument>,
}

/// Result of a single-document insert
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneOutcome {
    pub acknowledged: bool,
    pub inserted_id: Bson,
}

/// Result of a bulk insert
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManyOutcome {
    pub acknowledged: bool,
    pub inserted_count: usize,
    pub inserted_ids: Vec<Bson>,
}

/// Result of an update or replace
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

/// Result of a delete
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl CollectionHandle {
    pub(crate) fn new(key: CollectionKey, collection: Collection<BsonDocument>) -> Self {
        Self { key, collection }
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    /// Collection name without the database prefix
    pub fn name(&self) -> &str {
        self.key.collection()
    }

    /// Starts a deferred query over this collection
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(self.collection.clone())
    }

    /// Inserts one document
    ///
    /// The document must be a plain JSON object and satisfy the
    /// schema-light field constraints; violations fail with a
    /// `BadRequest`-tagged error before any store call.
    pub async fn insert_one(&self, document: &JsonValue) -> Result<InsertOneOutcome> {
        let doc = validation::require_document(document, "document")?;
        document::validate_document_fields(&doc)?;

        let result = self.collection.insert_one(doc).await?;
        Ok(InsertOneOutcome {
            acknowledged: true,
            inserted_id: result.inserted_id,
        })
    }

    /// Inserts a non-empty batch of documents
    pub async fn insert_many(&self, documents: &JsonValue) -> Result<InsertManyOutcome> {
        let docs = validation::require_document_array(documents, "documents")?;
        for doc in &docs {
            document::validate_document_fields(doc)?;
        }

        let result = self.collection.insert_many(docs).await?;
        let mut pairs: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        pairs.sort_by_key(|(index, _)| *index);
        let inserted_ids: Vec<Bson> = pairs.into_iter().map(|(_, id)| id).collect();

        Ok(InsertManyOutcome {
            acknowledged: true,
            inserted_count: inserted_ids.len(),
            inserted_ids,
        })
    }

    /// Updates the first document matching the filter
    pub async fn update_one(
        &self,
        filter: &JsonValue,
        update: &JsonValue,
        options: Option<&JsonValue>,
    ) -> Result<UpdateOutcome> {
        let (filter, update, write) = prepare_update_arguments(filter, update, options)?;

        let mut update_options = UpdateOptions::default();
        update_options.upsert = write.upsert;

        let result = self
            .collection
            .update_one(filter, update)
            .with_options(update_options)
            .await?;
        Ok(update_outcome(
            result.matched_count,
            result.modified_count,
            result.upserted_id,
        ))
    }

    /// Updates every document matching the filter
    pub async fn update_many(
        &self,
        filter: &JsonValue,
        update: &JsonValue,
        options: Option<&JsonValue>,
    ) -> Result<UpdateOutcome> {
        let (filter, update, write) = prepare_update_arguments(filter, update, options)?;

        let mut update_options = UpdateOptions::default();
        update_options.upsert = write.upsert;

        let result = self
            .collection
            .update_many(filter, update)
            .with_options(update_options)
            .await?;
        Ok(update_outcome(
            result.matched_count,
            result.modified_count,
            result.upserted_id,
        ))
    }

    /// Replaces the first document matching the filter
    ///
    /// The replacement must be an operator-free document; the store rejects
    /// replacements carrying update operators.
    pub async fn replace_one(
        &self,
        filter: &JsonValue,
        replacement: &JsonValue,
        options: Option<&JsonValue>,
    ) -> Result<UpdateOutcome> {
        let filter = validation::require_document(filter, "filter")?;
        let replacement = validation::require_document(replacement, "replacement")?;
        document::validate_document_fields(&replacement)?;
        let write = validation::parse_write_options(options, "options")?;

        let mut replace_options = ReplaceOptions::default();
        replace_options.upsert = write.upsert;

        let result = self
            .collection
            .replace_one(filter, replacement)
            .with_options(replace_options)
            .await?;
        Ok(update_outcome(
            result.matched_count,
            result.modified_count,
            result.upserted_id,
        ))
    }

    /// Deletes the first document matching the filter
    pub async fn delete_one(
        &self,
        filter: &JsonValue,
        options: Option<&JsonValue>,
    ) -> Result<DeleteOutcome> {
        let filter = validation::require_document(filter, "filter")?;
        validation::parse_write_options(options, "options")?;

        let result = self.collection.delete_one(filter).await?;
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    /// Deletes every document matching the filter
    pub async fn delete_many(
        &self,
        filter: &JsonValue,
        options: Option<&JsonValue>,
    ) -> Result<DeleteOutcome> {
        let filter = validation::require_document(filter, "filter")?;
        validation::parse_write_options(options, "options")?;

        let result = self.collection.delete_many(filter).await?;
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    /// Runs an aggregation pipeline supplied as JSON stages
    pub async fn aggregate(&self, pipeline: &JsonValue) -> Result<Vec<BsonDocument>> {
        let stages = validation::require_document_array(pipeline, "pipeline")?;
        self.aggregate_documents(stages).await
    }

    pub(crate) async fn aggregate_documents(
        &self,
        stages: Vec<BsonDocument>,
    ) -> Result<Vec<BsonDocument>> {
        let cursor = self.collection.aggregate(stages).await?;
        let results: Vec<BsonDocument> = cursor.try_collect().await?;
        Ok(results)
    }
}

fn prepare_update_arguments(
    filter: &JsonValue,
    update: &JsonValue,
    options: Option<&JsonValue>,
) -> Result<(BsonDocument, BsonDocument, validation::WriteOptions)> {
    let filter = validation::require_document(filter, "filter")?;
    let update = validation::ensure_update_operators(validation::require_document(update, "update")?);
    let write = validation::parse_write_options(options, "options")?;
    Ok((filter, update, write))
}

fn update_outcome(matched_count: u64, modified_count: u64, upserted_id: Option<Bson>) -> UpdateOutcome {
    UpdateOutcome {
        acknowledged: true,
        matched_count,
        modified_count,
        upserted_id,
    }
}

impl ConnectionManager {
    /// Resolves a configured collection target to a cached handle
    ///
    /// A dotted target routes to a different database over the active
    /// client; anything else targets the active database. The first
    /// resolution of a key constructs and memoizes the handle; later calls
    /// return the cached one.
    ///
    /// # Errors
    /// Returns `BridgeError::NotInitialized` while disconnected.
    pub fn resolve_collection(&self, configured: Option<&str>) -> Result<CollectionHandle> {
        let database = self.active_database()?;
        let (db_override, name) = split_collection_target(configured);
        let key = CollectionKey::new(db_override.unwrap_or_else(|| database.name()), name);

        {
            let cache = self
                .collections
                .read()
                .expect("collection cache lock poisoned");
            if let Some(handle) = cache.get(&key) {
                return Ok(handle.clone());
            }
        }

        let target = match db_override {
            Some(db_name) if db_name != database.name() => {
                self.active_client()?.database(db_name)
            }
            _ => database,
        };
        let handle = CollectionHandle::new(key.clone(), target.collection(key.collection()));
        debug!(collection = %key, "collection handle created");

        let mut cache = self
            .collections
            .write()
            .expect("collection cache lock poisoned");
        Ok(cache.entry(key).or_insert(handle).clone())
    }
}
