//! Connection configuration
//!
//! Every recognized option is enumerated here with a documented default;
//! absence of a value is a typed `None`, never an untyped missing key. The
//! environment surface mirrors the deployment variables
//! (`MONGODB_URI`, `MONGODB_DB_NAME`, `MONGODB_COLLECTION`, ...).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use atlas_bridge_common::{BridgeError, Result};

/// Default server-selection timeout in milliseconds
pub const DEFAULT_SERVER_SELECTION_TIMEOUT_MS: u64 = 5_000;

/// Collection targeted when no collection name is configured
pub const DEFAULT_COLLECTION: &str = "samples";

/// TLS relaxation flags for self-signed Atlas-style endpoints
///
/// These are an escape hatch, not a default: each flag weakens certificate
/// verification for connections made by the client they configure. Unlike
/// the environment-wide knobs some stacks expose, relaxation here is scoped
/// to the configured client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// Accept certificates that fail verification
    pub allow_invalid_certificates: bool,
    /// Accept certificates whose hostname does not match the endpoint
    pub allow_invalid_hostnames: bool,
    /// Shorthand that relaxes both certificate and hostname checks
    pub insecure: bool,
    /// Path to a custom CA bundle for private or self-signed deployments
    pub ca_file_path: Option<PathBuf>,
}

impl TlsSettings {
    /// True when any option requires custom TLS configuration on the client
    pub fn is_customized(&self) -> bool {
        self.allow_invalid_certificates
            || self.allow_invalid_hostnames
            || self.insecure
            || self.ca_file_path.is_some()
    }

    /// True when certificate verification is weakened in any way
    pub fn relaxes_verification(&self) -> bool {
        self.allow_invalid_certificates || self.allow_invalid_hostnames || self.insecure
    }
}

/// Immutable connection settings, read once per connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Connection URI (mandatory)
    pub uri: String,
    /// Target database name (mandatory)
    pub database: String,
    /// Configured collection target, optionally dotted as
    /// `"<db>.<collection>"` for cross-database routing
    pub collection: Option<String>,
    /// Server-selection timeout in milliseconds (default 5000)
    pub server_selection_timeout_ms: u64,
    /// Bypass topology discovery and connect to the host directly
    pub direct_connection: Option<bool>,
    /// TLS relaxation flags
    pub tls: TlsSettings,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: String::new(),
            collection: None,
            server_selection_timeout_ms: DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
            direct_connection: None,
            tls: TlsSettings::default(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a config with the mandatory settings and defaults elsewhere
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Reads the full `MONGODB_*` environment surface
    ///
    /// Missing mandatory values are left empty and reported by
    /// [`ConnectionConfig::validate`] before any I/O happens.
    pub fn from_env() -> Self {
        Self {
            uri: env_string("MONGODB_URI").unwrap_or_default(),
            database: env_string("MONGODB_DB_NAME").unwrap_or_default(),
            collection: env_string("MONGODB_COLLECTION"),
            server_selection_timeout_ms: parse_timeout(
                env_string("MONGODB_SERVER_SELECTION_TIMEOUT_MS").as_deref(),
            ),
            direct_connection: if parse_flag(env_string("MONGODB_DIRECT_CONNECTION").as_deref()) {
                Some(true)
            } else {
                None
            },
            tls: TlsSettings {
                allow_invalid_certificates: parse_flag(
                    env_string("MONGODB_TLS_ALLOW_INVALID_CERTS").as_deref(),
                ),
                allow_invalid_hostnames: parse_flag(
                    env_string("MONGODB_TLS_ALLOW_INVALID_HOSTNAMES").as_deref(),
                ),
                insecure: parse_flag(env_string("MONGODB_TLS_INSECURE").as_deref()),
                ca_file_path: env_string("MONGODB_TLS_CA_FILE").map(PathBuf::from),
            },
        }
    }

    /// Checks mandatory settings, failing fast before any network I/O
    ///
    /// # Errors
    /// Returns `BridgeError::Configuration` if the URI or database name is
    /// missing.
    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "MONGODB_URI is not set".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "MONGODB_DB_NAME is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Server-selection timeout as a `Duration`
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// A flag is set only by the exact string `"true"`
fn parse_flag(value: Option<&str>) -> bool {
    value == Some("true")
}

/// Unparsable or missing timeouts fall back to the default
fn parse_timeout(value: Option<&str>) -> u64 {
    value
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_SERVER_SELECTION_TIMEOUT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_defaults() {
        let config = ConnectionConfig::new("mongodb://localhost:27017", "app");
        assert_eq!(config.uri, "mongodb://localhost:27017");
        assert_eq!(config.database, "app");
        assert_eq!(
            config.server_selection_timeout_ms,
            DEFAULT_SERVER_SELECTION_TIMEOUT_MS
        );
        assert!(config.collection.is_none());
        assert!(config.direct_connection.is_none());
        assert!(!config.tls.is_customized());
    }

    #[test]
    fn test_validate_requires_uri() {
        let config = ConnectionConfig::new("", "app");
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("MONGODB_URI"));
    }

    #[test]
    fn test_validate_requires_database() {
        let config = ConnectionConfig::new("mongodb://localhost:27017", "  ");
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("MONGODB_DB_NAME"));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let config = ConnectionConfig::new("mongodb://localhost:27017", "app");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_flag_requires_exact_true() {
        assert!(parse_flag(Some("true")));
        assert!(!parse_flag(Some("TRUE")));
        assert!(!parse_flag(Some("1")));
        assert!(!parse_flag(Some("yes")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_parse_timeout_fallback() {
        assert_eq!(parse_timeout(Some("2500")), 2_500);
        assert_eq!(
            parse_timeout(Some("not-a-number")),
            DEFAULT_SERVER_SELECTION_TIMEOUT_MS
        );
        assert_eq!(parse_timeout(Some("0")), DEFAULT_SERVER_SELECTION_TIMEOUT_MS);
        assert_eq!(parse_timeout(None), DEFAULT_SERVER_SELECTION_TIMEOUT_MS);
    }

    #[test]
    fn test_tls_settings_relaxation() {
        let mut tls = TlsSettings::default();
        assert!(!tls.relaxes_verification());

        tls.insecure = true;
        assert!(tls.relaxes_verification());
        assert!(tls.is_customized());

        let ca_only = TlsSettings {
            ca_file_path: Some(PathBuf::from("/etc/ssl/atlas-ca.pem")),
            ..TlsSettings::default()
        };
        assert!(ca_only.is_customized());
        assert!(!ca_only.relaxes_verification());
    }

    #[test]
    fn test_server_selection_timeout_duration() {
        let mut config = ConnectionConfig::new("mongodb://localhost:27017", "app");
        config.server_selection_timeout_ms = 250;
        assert_eq!(config.server_selection_timeout(), Duration::from_millis(250));
    }
}
