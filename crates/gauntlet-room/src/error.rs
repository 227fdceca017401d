//! Error types for the room layer.
//!
//! Most of these never reach a client. The arena turns a failed handler
//! into a debug log and leaves room state untouched.

use gauntlet_combat::CombatError;
use gauntlet_protocol::{MatchId, RoomId, SeatId};
use gauntlet_session::SessionError;
use gauntlet_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (or was torn down mid-flight).
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Every seat is taken.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The connection already holds a seat.
    #[error("{0} already in room {1}")]
    AlreadyInRoom(ConnectionId, RoomId),

    /// The connection holds no seat.
    #[error("{0} is not in a room")]
    NotInRoom(ConnectionId),

    /// The connection never completed the handshake, or is gone.
    #[error("{0} is not connected")]
    UnknownConnection(ConnectionId),

    /// The room's phase does not allow the operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    #[error("unknown hero: {0}")]
    UnknownHero(String),

    #[error("match {0} not found")]
    UnknownMatch(MatchId),

    /// A second result for a match that is already settled.
    #[error("match {0} already completed")]
    MatchCompleted(MatchId),

    #[error("seat {0} is not in match {1}")]
    NotInMatch(SeatId, MatchId),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Server-side battle resolution failed.
    #[error(transparent)]
    Combat(#[from] CombatError),
}
