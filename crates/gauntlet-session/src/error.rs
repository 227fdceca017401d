//! Error types for the session layer.

use gauntlet_transport::ConnectionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the credential.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session is bound to the connection.
    #[error("no session for {0}")]
    NotFound(ConnectionId),

    /// The token was never issued, or its session is already gone.
    #[error("invalid reconnection token")]
    InvalidToken,

    /// The reconnection window elapsed. The session has been evicted.
    #[error("session expired")]
    Expired,

    /// The session is still bound to a live connection.
    #[error("session is already active")]
    AlreadyActive,
}
