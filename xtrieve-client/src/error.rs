//! Client error types.

use std::io;
use thiserror::Error;
use xtrieve_protocol::{ProtocolError, StatusCode};

/// Client errors.
///
/// Local failures and remote outcomes are kept apart: a completed exchange
/// is never an error unless the caller asks for one with
/// [`Reply::check`](crate::Reply::check), which produces [`ClientError::Status`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to resolve host {host}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[source] ProtocolError),

    #[error("invalid request: {0}")]
    InvalidRequest(#[source] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("engine returned {0}")]
    Status(StatusCode),
}

impl ClientError {
    /// Returns true for failures of the local transport, as opposed to
    /// outcomes reported by the engine.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Resolution { .. }
                | ClientError::Connect { .. }
                | ClientError::Transport(_)
                | ClientError::NotConnected
        )
    }

    /// Returns whether repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Connect { .. } => true,
            ClientError::Transport(_) => true,
            ClientError::NotConnected => true,
            ClientError::Status(status) => status.is_retryable(),
            _ => false,
        }
    }

    /// The engine status, if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status(status) => Some(*status),
            _ => None,
        }
    }
}
