//! Error types for atlas-bridge

use thiserror::Error;

/// Result type alias for atlas-bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for all atlas-bridge operations
///
/// The variants mirror the failure categories callers need to tell apart:
/// configuration problems never touch the network, `BadRequest` is detected
/// before dispatch and maps to a client fault, `ServerSelection` means the
/// deployment was unreachable, and `Database` is anything else the store
/// reported. Errors are `Clone` because a single in-flight connection
/// attempt fans its outcome out to every concurrent waiter.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// Missing or invalid connection settings, or a TLS handshake failure
    /// reclassified with a remediation hint. Never retried automatically.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation required an active connection before `connect` succeeded.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Malformed caller-supplied document detected before dispatch.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The driver could not select a server within the configured timeout.
    #[error("Server selection error: {0}")]
    ServerSelection(String),

    /// Any other failure returned by the underlying store.
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl BridgeError {
    /// Returns true if this error was caused by caller-supplied input and
    /// should map to a client-fault (HTTP 400 style) response
    pub fn is_bad_request(&self) -> bool {
        matches!(self, BridgeError::BadRequest(_))
    }

    /// Returns true if this is a configuration error raised before any
    /// network I/O
    pub fn is_configuration(&self) -> bool {
        matches!(self, BridgeError::Configuration(_))
    }

    /// Returns true if the deployment could not be reached (upstream-fault,
    /// HTTP 502 style)
    pub fn is_server_selection(&self) -> bool {
        matches!(self, BridgeError::ServerSelection(_))
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for BridgeError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;
        match err.kind.as_ref() {
            ErrorKind::ServerSelection { .. } => BridgeError::ServerSelection(err.to_string()),
            _ => BridgeError::Database(err.to_string()),
        }
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for BridgeError {
    fn from(err: bson::ser::Error) -> Self {
        BridgeError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for BridgeError {
    fn from(err: bson::de::Error) -> Self {
        BridgeError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}
