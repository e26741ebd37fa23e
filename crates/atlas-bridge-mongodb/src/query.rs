//! Deferred query builder
//!
//! A [`QueryBuilder`] is a chainable description of a find operation; no
//! I/O happens until a terminal operation runs. Terminal operations take
//! the builder by value, so a builder describes exactly one query and can
//! never be reconfigured after execution; a fresh builder is created per
//! logical query.

use bson::Document as BsonDocument;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{Collection, Cursor};

use atlas_bridge_common::Result;

use crate::document;

/// Chainable query description over one collection
pub struct QueryBuilder {
    collection: Collection<BsonDocument>,
    filter: BsonDocument,
    projection: Option<BsonDocument>,
    limit: Option<i64>,
    batch_size: Option<u32>,
    lean: bool,
}

impl QueryBuilder {
    pub(crate) fn new(collection: Collection<BsonDocument>) -> Self {
        Self {
            collection,
            filter: BsonDocument::new(),
            projection: None,
            limit: None,
            batch_size: None,
            lean: false,
        }
    }

    /// Sets the filter document
    pub fn filter(mut self, filter: BsonDocument) -> Self {
        self.filter = filter;
        self
    }

    /// Sets a field inclusion/exclusion projection, passed through unmodified
    pub fn projection(mut self, projection: BsonDocument) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Caps the number of returned documents; zero or negative means unlimited
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = if limit > 0 { Some(limit) } else { None };
        self
    }

    /// Sets the page size used by streaming execution
    ///
    /// Irrelevant to buffered execution; zero is ignored.
    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = if batch_size > 0 { Some(batch_size) } else { None };
        self
    }

    /// Returns raw wire documents instead of hydrated ones
    ///
    /// Plain mode passes each result through the document model (defaults
    /// applied, title/category trimmed); lean mode skips that. Query
    /// semantics are identical either way.
    pub fn lean(mut self) -> Self {
        self.lean = true;
        self
    }

    /// Get the filter document
    pub fn get_filter(&self) -> &BsonDocument {
        &self.filter
    }

    /// Get the projection document
    pub fn get_projection(&self) -> Option<&BsonDocument> {
        self.projection.as_ref()
    }

    /// Get the effective limit
    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    /// Get the effective batch size
    pub fn get_batch_size(&self) -> Option<u32> {
        self.batch_size
    }

    /// Whether lean mode is selected
    pub fn is_lean(&self) -> bool {
        self.lean
    }

    fn find_options(&self) -> FindOptions {
        let mut options = FindOptions::default();
        options.projection = self.projection.clone();
        options.limit = self.limit;
        options.batch_size = self.batch_size;
        options
    }

    /// Executes buffered, returning all matching documents in store order
    ///
    /// Each call re-issues the query; results are never cached client-side.
    pub async fn execute(self) -> Result<Vec<BsonDocument>> {
        let options = self.find_options();
        let cursor = self
            .collection
            .find(self.filter)
            .with_options(options)
            .await?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await?;

        if self.lean {
            Ok(docs)
        } else {
            docs.into_iter().map(document::hydrate).collect()
        }
    }

    /// Executes as a streaming cursor
    ///
    /// The returned stream is finite and non-restartable; the caller must
    /// call [`DocumentStream::close`] on every exit path.
    pub async fn stream(self) -> Result<DocumentStream> {
        let options = self.find_options();
        let cursor = self
            .collection
            .find(self.filter)
            .with_options(options)
            .await?;
        Ok(DocumentStream::new(cursor, self.lean))
    }
}

/// Lazy, finite sequence of documents pulled in batches
///
/// Owns a server-side cursor. Call [`DocumentStream::close`] on normal
/// completion, on early termination, and on any error raised
/// mid-iteration; an unclosed stream leaks the server-side cursor until
/// the handle is dropped.
pub struct DocumentStream {
    cursor: Option<Cursor<BsonDocument>>,
    lean: bool,
}

impl DocumentStream {
    fn new(cursor: Cursor<BsonDocument>, lean: bool) -> Self {
        Self {
            cursor: Some(cursor),
            lean,
        }
    }

    #[cfg(test)]
    fn detached(lean: bool) -> Self {
        Self { cursor: None, lean }
    }

    /// Pulls the next document, or `None` when exhausted or closed
    pub async fn next(&mut self) -> Result<Option<BsonDocument>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        match cursor.try_next().await? {
            Some(doc) if self.lean => Ok(Some(doc)),
            Some(doc) => document::hydrate(doc).map(Some),
            None => Ok(None),
        }
    }

    /// Releases the server-side cursor; no further documents are pulled
    ///
    /// Idempotent. Dropping the driver cursor triggers the server-side
    /// kill, so close on every exit path, including errors.
    pub fn close(&mut self) {
        self.cursor = None;
    }

    /// Whether the stream has been closed
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }
}
