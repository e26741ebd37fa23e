//! TLS handshake failure classification
//!
//! Connection failures against Atlas-style endpoints frequently come down to
//! certificate verification, and the driver reports them as generic
//! server-selection errors. The classifier here walks an error's cause chain
//! looking for handshake-shaped failures so the connection manager can
//! surface a configuration error with a remediation hint instead of an
//! opaque timeout.

use std::error::Error as StdError;

/// Upper bound on cause-chain traversal
///
/// Real driver chains are a handful of nodes deep; the bound guarantees
/// termination even on malformed chains.
pub const MAX_CAUSE_CHAIN_DEPTH: usize = 8;

/// Lowercase message fragments that identify a TLS handshake failure
///
/// Covers both rustls-shaped renderings (invalid peer certificate, unknown
/// issuer) and openssl-shaped alert codes that proxies and tunnels bubble
/// through verbatim.
const TLS_FAILURE_MARKERS: &[&str] = &[
    "tls handshake",
    "handshake failure",
    "received fatal alert",
    "invalid peer certificate",
    "certificate verify failed",
    "unknown issuer",
    "unknownissuer",
    "self-signed certificate",
    "self signed certificate",
    "err_ssl_tlsv1_alert_internal_error",
    "err_ssl_certificate",
    "err_ssl_self_signed_cert_in_chain",
];

/// Hint appended to connection errors reclassified as TLS failures
pub const TLS_REMEDIATION_HINT: &str = "The deployment rejected the TLS handshake. Set \
    MONGODB_TLS_CA_FILE to a custom CA bundle, or set \
    MONGODB_TLS_ALLOW_INVALID_CERTS=true / MONGODB_TLS_INSECURE=true to relax certificate \
    verification. If hostnames do not match, also set \
    MONGODB_TLS_ALLOW_INVALID_HOSTNAMES=true.";

/// Returns true when the error or one of its causes is TLS-handshake shaped
///
/// Walks the `source()` chain, at most [`MAX_CAUSE_CHAIN_DEPTH`] nodes,
/// testing each node's rendered message against the fixed marker set. Never
/// panics; an error without structured causes is simply a one-node chain.
pub fn is_tls_handshake_failure(error: &(dyn StdError + 'static)) -> bool {
    let mut node: Option<&(dyn StdError + 'static)> = Some(error);
    let mut depth = 0;

    while let Some(current) = node {
        if depth >= MAX_CAUSE_CHAIN_DEPTH {
            return false;
        }
        let message = current.to_string().to_ascii_lowercase();
        if TLS_FAILURE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
        {
            return true;
        }
        node = current.source();
        depth += 1;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct ChainedError {
        message: String,
        cause: Option<Box<ChainedError>>,
    }

    impl ChainedError {
        fn leaf(message: &str) -> Self {
            Self {
                message: message.to_string(),
                cause: None,
            }
        }

        fn wrap(message: &str, cause: ChainedError) -> Self {
            Self {
                message: message.to_string(),
                cause: Some(Box::new(cause)),
            }
        }
    }

    impl fmt::Display for ChainedError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl StdError for ChainedError {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.cause
                .as_deref()
                .map(|cause| cause as &(dyn StdError + 'static))
        }
    }

    #[test]
    fn test_marker_at_depth_two_classifies_true() {
        let err = ChainedError::wrap(
            "server selection timed out",
            ChainedError::wrap(
                "connection reset",
                ChainedError::leaf("ERR_SSL_CERTIFICATE"),
            ),
        );
        assert!(is_tls_handshake_failure(&err));
    }

    #[test]
    fn test_top_level_marker_classifies_true() {
        let err = ChainedError::leaf("invalid peer certificate: UnknownIssuer");
        assert!(is_tls_handshake_failure(&err));
    }

    #[test]
    fn test_unrelated_chain_classifies_false() {
        let err = ChainedError::wrap(
            "server selection timed out",
            ChainedError::leaf("connection refused"),
        );
        assert!(!is_tls_handshake_failure(&err));
    }

    #[test]
    fn test_marker_beyond_depth_bound_is_ignored() {
        let mut err = ChainedError::leaf("received fatal alert: HandshakeFailure");
        for i in 0..MAX_CAUSE_CHAIN_DEPTH {
            err = ChainedError::wrap(&format!("wrapper {}", i), err);
        }
        // Marker sits at depth MAX_CAUSE_CHAIN_DEPTH, one past the bound.
        assert!(!is_tls_handshake_failure(&err));
    }

    #[test]
    fn test_marker_at_last_inspected_node_classifies_true() {
        let mut err = ChainedError::leaf("self-signed certificate in certificate chain");
        for i in 0..MAX_CAUSE_CHAIN_DEPTH - 1 {
            err = ChainedError::wrap(&format!("wrapper {}", i), err);
        }
        assert!(is_tls_handshake_failure(&err));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let err = ChainedError::leaf("TLS Handshake EOF");
        assert!(is_tls_handshake_failure(&err));
    }
}
