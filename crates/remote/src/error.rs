//! Error types for the remote session.

use std::time::Duration;

/// Failure to establish an authenticated session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("authentication failed for {user} using {method}")]
    AuthenticationFailed { user: String, method: &'static str },

    #[error("cannot load key file {path}: {reason}")]
    Key { path: String, reason: String },

    #[error("failed to connect: {0}")]
    Transport(String),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),
}

impl ConnectError {
    /// Returns `true` when the router rejected the credentials, as opposed
    /// to being unreachable.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ConnectError::AuthenticationFailed { .. } | ConnectError::Key { .. }
        )
    }
}

/// Failure to run a command on the router.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("connection failed: {0}")]
    Connection(#[from] ConnectError),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}
