//! Gateway error types.

use thiserror::Error;
use xtrieve_protocol::ProtocolError;

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("failed to connect to engine at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The reconnect policy ran out of attempts. The session cannot continue.
    #[error("engine at {addr} unreachable after {attempts} attempt(s): {last_error}")]
    Unrecoverable {
        addr: String,
        attempts: u32,
        last_error: String,
    },

    #[error("gateway shutting down")]
    ShuttingDown,
}

impl GatewayError {
    /// Returns whether the engine is lost for good, as opposed to one link
    /// failing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Unrecoverable { .. } | GatewayError::Connect { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_display() {
        let err = GatewayError::Unrecoverable {
            addr: "127.0.0.1:7419".to_string(),
            attempts: 3,
            last_error: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "engine at 127.0.0.1:7419 unreachable after 3 attempt(s): connection refused"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_link_errors_are_not_fatal() {
        let err: GatewayError = ProtocolError::ConnectionClosed.into();
        assert!(!err.is_fatal());
        assert!(!GatewayError::ShuttingDown.is_fatal());
    }
}
