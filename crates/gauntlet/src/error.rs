//! Unified error type for the Gauntlet server.

use gauntlet_combat::CombatError;
use gauntlet_protocol::ProtocolError;
use gauntlet_room::RoomError;
use gauntlet_session::SessionError;
use gauntlet_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GauntletError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, reconnect, expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Combat(#[from] CombatError),

    /// The arena task has stopped.
    #[error("arena is no longer running")]
    ArenaClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error_wraps() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wrapped: GauntletError = err.into();
        assert!(matches!(wrapped, GauntletError::Transport(_)));
        assert!(wrapped.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error_wraps() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let wrapped: GauntletError = err.into();
        assert!(matches!(wrapped, GauntletError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error_wraps() {
        let err = SessionError::AuthFailed("nope".into());
        let wrapped: GauntletError = err.into();
        assert!(matches!(wrapped, GauntletError::Session(_)));
    }

    #[test]
    fn test_from_room_error_wraps() {
        let err = RoomError::NotFound(gauntlet_protocol::RoomId(1));
        let wrapped: GauntletError = err.into();
        assert!(matches!(wrapped, GauntletError::Room(_)));
        assert!(wrapped.to_string().contains("R-1"));
    }

    #[test]
    fn test_from_combat_error_wraps() {
        let err = CombatError::UnknownHero("dragon".into());
        let wrapped: GauntletError = err.into();
        assert!(matches!(wrapped, GauntletError::Combat(_)));
    }
}
