//! Session types.

use std::time::{Duration, Instant};

use gauntlet_protocol::{RoomId, SlotSnapshot};
use gauntlet_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing for reconnection.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected session stays claimable.
    pub reconnect_window: Duration,

    /// How often the server purges lapsed sessions.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Whether a session is bound to a live connection.
///
/// ```text
///   Active ──(disconnect)──→ Disconnected ──(window lapses)──→ evicted
///     ↑                            │
///     └────────(reconnect)─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Disconnected { since: Instant, expires_at: Instant },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A player's claim on a seat, independent of any one connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// 64 hex characters from the thread-local CSPRNG.
    pub token: String,
    /// The connection currently (or most recently) bound.
    pub connection: ConnectionId,
    /// The room holding the player's seat. Not owned: the room may be gone.
    pub room_id: RoomId,
    /// The seat as it was when the session was issued.
    pub snapshot: SlotSnapshot,
    pub created_at: Instant,
    pub state: SessionState,
}

impl Session {
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active)
    }

    /// When the reconnection window closes, if one is open.
    pub fn expires_at(&self) -> Option<Instant> {
        match self.state {
            SessionState::Active => None,
            SessionState::Disconnected { expires_at, .. } => Some(expires_at),
        }
    }

    /// Returns `true` if the window is open and has lapsed at `now`.
    ///
    /// The window is inclusive: a session is still claimable at exactly
    /// `expires_at`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at().is_some_and(|at| now > at)
    }
}
