//! MongoDB bridge layer for atlas-bridge
//!
//! This crate sits between application code and a MongoDB/Atlas deployment
//! reached over TLS.
//!
//! # Features
//! - Lazy connection establishment with request deduplication
//! - TLS-failure classification with remediation hints
//! - Cross-database collection routing with handle memoization
//! - Deferred query builder with buffered and streaming execution
//! - Shape-validated bulk mutation passthroughs
//! - Schema-light document model with defaults and field constraints

pub mod collection;
pub mod config;
pub mod connection;
pub mod document;
pub mod query;
pub mod stats;
pub mod tls;
pub mod validation;

pub use atlas_bridge_common::{BridgeError, Result};
pub use collection::{
    split_collection_target, CollectionHandle, CollectionKey, DeleteOutcome, InsertManyOutcome,
    InsertOneOutcome, UpdateOutcome,
};
pub use config::{
    ConnectionConfig, TlsSettings, DEFAULT_COLLECTION, DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
};
pub use connection::ConnectionManager;
pub use document::{validate_document_fields, DocumentModel, DEFAULT_STATUS, STATUS_VALUES};
pub use query::{DocumentStream, QueryBuilder};
pub use stats::SummarySpec;
pub use tls::{is_tls_handshake_failure, MAX_CAUSE_CHAIN_DEPTH, TLS_REMEDIATION_HINT};
pub use validation::WriteOptions;
