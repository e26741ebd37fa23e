//! Lazy MongoDB connection management
//!
//! One [`ConnectionManager`] instance owns the connection lifecycle for a
//! process: it is constructed disconnected, establishes the client on the
//! first `connect` call, deduplicates concurrent attempts through a shared
//! in-flight future, and invalidates every cached collection handle on
//! `close`. The manager is an explicit handle passed to consumers, never
//! ambient global state, so tests construct isolated instances.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock};

use bson::doc;
use futures::future::{BoxFuture, FutureExt, Shared};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion, Tls, TlsOptions};
use mongodb::{Client, Database};
use tracing::{info, instrument, warn};

use atlas_bridge_common::{BridgeError, Result};

use crate::collection::{CollectionHandle, CollectionKey};
use crate::config::ConnectionConfig;
use crate::tls::{is_tls_handshake_failure, TLS_REMEDIATION_HINT};

type ConnectOutcome = Result<(Client, Database)>;
type SharedConnect = Shared<BoxFuture<'static, ConnectOutcome>>;

/// Connection lifecycle state
///
/// Invariant: `database` is `Some` iff `client` is `Some`. `pending` is
/// `Some` only while an attempt is outstanding and is cleared on both
/// success and failure so a later call can retry. `attempt` is bumped when
/// an attempt starts and when the manager closes, so a slow waiter of an
/// old attempt never clobbers the marker or handles of a newer one.
#[derive(Default)]
struct ConnectionState {
    client: Option<Client>,
    database: Option<Database>,
    pending: Option<SharedConnect>,
    attempt: u64,
}

/// Lazy connection manager with request deduplication
pub struct ConnectionManager {
    state: Mutex<ConnectionState>,
    pub(crate) collections: RwLock<HashMap<CollectionKey, CollectionHandle>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates a disconnected manager
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::default()),
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().expect("connection state lock poisoned")
    }

    /// Connects lazily, returning the active database handle
    ///
    /// Idempotent: when already connected this returns immediately with no
    /// I/O. When an attempt is already in flight, every concurrent caller
    /// awaits the same underlying attempt, so exactly one client is
    /// constructed no matter how many callers race the first use.
    ///
    /// # Errors
    /// - `Configuration` when the config is incomplete (raised before any
    ///   network I/O) or when establishment failed on a TLS handshake, in
    ///   which case the message carries a remediation hint.
    /// - `ServerSelection` when no server could be reached within the
    ///   configured timeout.
    /// - `Database` for any other driver failure.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<Database> {
        config.validate()?;

        let (pending, my_attempt) = {
            let mut state = self.lock_state();
            if let Some(database) = &state.database {
                return Ok(database.clone());
            }
            match &state.pending {
                Some(attempt) => (attempt.clone(), state.attempt),
                None => {
                    let attempt = Self::establish(config.clone()).boxed().shared();
                    state.attempt += 1;
                    state.pending = Some(attempt.clone());
                    (attempt, state.attempt)
                }
            }
        };

        let outcome = pending.await;

        let mut state = self.lock_state();
        if state.attempt == my_attempt {
            state.pending = None;
        }
        match outcome {
            Ok((client, database)) => {
                if state.attempt == my_attempt && state.client.is_none() {
                    state.client = Some(client);
                    state.database = Some(database);
                }
                state.database.clone().ok_or_else(|| {
                    BridgeError::NotInitialized(
                        "connection was closed while it was being established".to_string(),
                    )
                })
            }
            Err(err) => Err(err),
        }
    }

    /// One connection attempt, shared by every caller that races it
    #[instrument(skip(config), fields(database = %config.database))]
    async fn establish(config: ConnectionConfig) -> ConnectOutcome {
        let mut options = ClientOptions::parse(&config.uri).await.map_err(|e| {
            BridgeError::Configuration(format!("Invalid connection URI: {}", e))
        })?;

        options.server_selection_timeout = Some(config.server_selection_timeout());
        options.direct_connection = config.direct_connection;
        options.app_name = Some("atlas-bridge".to_string());

        // Pin the stable server API for Atlas compatibility
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        options.server_api = Some(server_api);

        if config.tls.is_customized() {
            let mut tls = TlsOptions::default();
            if let Some(path) = &config.tls.ca_file_path {
                tls.ca_file_path = Some(path.clone());
            }
            if config.tls.allow_invalid_certificates || config.tls.insecure {
                tls.allow_invalid_certificates = Some(true);
            }
            if config.tls.allow_invalid_hostnames || config.tls.insecure {
                tls.allow_invalid_hostnames = Some(true);
            }
            if config.tls.relaxes_verification() {
                // Relaxation covers only connections made by this client.
                warn!("TLS certificate verification relaxed for this client");
            }
            options.tls = Some(Tls::Enabled(tls));
        }

        let client = Client::with_options(options)
            .map_err(|e| BridgeError::Configuration(format!("Invalid client options: {}", e)))?;
        let database = client.database(&config.database);

        // The driver defers all I/O until the first operation; ping now so
        // establishment failures surface here, where they are classified.
        if let Err(err) = database.run_command(doc! { "ping": 1 }).await {
            if is_tls_handshake_failure(&err) {
                return Err(BridgeError::Configuration(format!(
                    "{}\n{}",
                    TLS_REMEDIATION_HINT, err
                )));
            }
            return Err(BridgeError::from(err));
        }

        info!("connection established");
        Ok((client, database))
    }

    /// Returns the active database handle without performing any I/O
    ///
    /// # Errors
    /// Returns `BridgeError::NotInitialized` when not connected.
    pub fn active_database(&self) -> Result<Database> {
        self.lock_state()
            .database
            .clone()
            .ok_or_else(not_initialized)
    }

    /// Returns the active client handle without performing any I/O
    ///
    /// # Errors
    /// Returns `BridgeError::NotInitialized` when not connected.
    pub fn active_client(&self) -> Result<Client> {
        self.lock_state()
            .client
            .clone()
            .ok_or_else(not_initialized)
    }

    /// Connection status, as a pure state read
    pub fn is_connected(&self) -> bool {
        self.lock_state().database.is_some()
    }

    /// Verifies connectivity by pinging the active database
    pub async fn ping(&self) -> Result<()> {
        let database = self.active_database()?;
        database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// Closes the connection and resets the manager to disconnected
    ///
    /// Every cached collection handle is evicted; resolving after close
    /// fails with `NotInitialized` until the next successful `connect`.
    /// Closing an already-closed manager is a no-op.
    pub async fn close(&self) -> Result<()> {
        let client = {
            let mut state = self.lock_state();
            state.pending = None;
            state.database = None;
            state.attempt += 1;
            state.client.take()
        };

        self.collections
            .write()
            .expect("collection cache lock poisoned")
            .clear();

        if let Some(client) = client {
            client.shutdown().await;
            info!("connection closed");
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_active_for_tests(&self, client: Client, database: Database) {
        let mut state = self.lock_state();
        state.client = Some(client);
        state.database = Some(database);
    }
}

fn not_initialized() -> BridgeError {
    BridgeError::NotInitialized(
        "database connection is not active; call connect() first".to_string(),
    )
}
