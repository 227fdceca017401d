//! Core protocol types for Gauntlet's wire format.
//!
//! Every type here travels on the wire as JSON. Events are adjacently
//! tagged so a client sees `{ "type": "selectHero", "data": { "heroId": "mage" } }`,
//! and field names are camelCase throughout to match the browser client.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room (one duo or bracket game session).
///
/// `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A stable per-room seat number, assigned once at join time (1..=N).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(pub u32);

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Identifies one pairing within a room. Unique per process, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Room mode and phase
// ---------------------------------------------------------------------------

/// The two room flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomMode {
    /// Head-to-head, two seats.
    Duo,
    /// Eight-seat elimination tournament.
    Bracket,
}

impl RoomMode {
    /// Seat capacity of a room in this mode.
    pub fn capacity(self) -> usize {
        match self {
            Self::Duo => 2,
            Self::Bracket => 8,
        }
    }
}

impl fmt::Display for RoomMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duo => write!(f, "duo"),
            Self::Bracket => write!(f, "bracket"),
        }
    }
}

/// Lifecycle phase of a room.
///
/// ```text
/// Waiting (bracket only) → Lobby → Buffer ⇄ Round → Complete
/// ```
///
/// A room can also complete straight from `Buffer` when forfeits leave a
/// single live player between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Waiting,
    Lobby,
    Buffer,
    Round,
    Complete,
}

impl Phase {
    /// Returns `true` while rounds are being played (buffer or round).
    pub fn is_running(self) -> bool {
        matches!(self, Self::Buffer | Self::Round)
    }

    /// Returns `true` if seats can still be added or removed freely.
    pub fn is_pregame(self) -> bool {
        matches!(self, Self::Waiting | Self::Lobby)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    ///
    /// Phases only move forward, except the buffer/round loop.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Lobby)
                | (Self::Lobby, Self::Buffer)
                | (Self::Buffer, Self::Round)
                | (Self::Round, Self::Buffer)
                | (Self::Round, Self::Complete)
                | (Self::Buffer, Self::Complete)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Lobby => write!(f, "lobby"),
            Self::Buffer => write!(f, "buffer"),
            Self::Round => write!(f, "round"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Current and maximum health of a player in the tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hp {
    pub current: u32,
    pub max: u32,
}

impl Hp {
    /// Full health at `max`.
    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Applies a loss, flooring at zero.
    pub fn lose(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    /// Returns `true` once current health reaches zero.
    pub fn is_depleted(&self) -> bool {
        self.current == 0
    }
}

/// Authoritative view of one seat, broadcast on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSnapshot {
    pub seat: SeatId,
    pub name: String,
    pub hero_id: Option<String>,
    pub ready: bool,
    pub hp: Hp,
    pub gold: u32,
    pub eliminated: bool,
    pub is_ghost: bool,
    pub wins: u32,
    pub losses: u32,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub connected: bool,
}

/// Authoritative view of a whole room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub mode: RoomMode,
    pub phase: Phase,
    pub round: u32,
    pub players: Vec<SlotSnapshot>,
}

/// One pairing as announced at round start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub player1: SeatId,
    pub player2: SeatId,
    /// `true` when one side is a ghost bye.
    pub ghost: bool,
    pub completed: bool,
    pub winner_id: Option<SeatId>,
}

/// What a player learns about their opponent for the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentInfo {
    pub seat: SeatId,
    pub name: String,
    pub hero_id: Option<String>,
    pub is_ghost: bool,
}

// ---------------------------------------------------------------------------
// ClientEvent (inbound)
// ---------------------------------------------------------------------------

/// Every event a client may send. Anything else fails to decode and is
/// dropped at the connection boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// First frame on a connection: protocol version and bearer token.
    Hello {
        version: u32,
        #[serde(default)]
        token: Option<String>,
    },

    /// Queue for (or backfill) a two-player duo room.
    RequestMatch {
        #[serde(default)]
        name: Option<String>,
    },

    /// Join an eight-player bracket waiting room.
    RequestTournament {
        #[serde(default)]
        name: Option<String>,
    },

    UpdateName { name: String },

    SelectHero { hero_id: String },

    PlayerReady,

    /// The client's own verdict on a battle. Trusted at face value; the
    /// first report per match wins.
    ClientBattleResult {
        match_id: MatchId,
        winner_id: SeatId,
        hp_lost: u32,
    },

    LeaveRoom,

    Disconnect,

    /// Resume a dropped session on a fresh connection.
    Reconnect { token: String },
}

impl ClientEvent {
    /// Short event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::RequestMatch { .. } => "requestMatch",
            Self::RequestTournament { .. } => "requestTournament",
            Self::UpdateName { .. } => "updateName",
            Self::SelectHero { .. } => "selectHero",
            Self::PlayerReady => "playerReady",
            Self::ClientBattleResult { .. } => "clientBattleResult",
            Self::LeaveRoom => "leaveRoom",
            Self::Disconnect => "disconnect",
            Self::Reconnect { .. } => "reconnect",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent (outbound)
// ---------------------------------------------------------------------------

/// Every event the server emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Handshake accepted.
    Welcome {
        connection_id: u64,
        protocol_version: u32,
    },

    /// Handshake rejected. `code` follows HTTP conventions.
    Error { code: u16, message: String },

    /// Duo queue membership for the receiving connection.
    QueueStatus {
        queued: bool,
        position: usize,
        waiting: usize,
    },

    /// Bracket waiting-room occupancy.
    WaitingRoomUpdate {
        room_id: RoomId,
        occupancy: usize,
        capacity: usize,
        players: Vec<String>,
    },

    /// A bracket room filled up; hero selection opens after `countdown` seconds.
    GameStarting { room_id: RoomId, countdown: u64 },

    /// Hero selection starts.
    ProceedToRules {
        room_id: RoomId,
        mode: RoomMode,
        capacity: usize,
    },

    /// Hero-selection progress.
    LobbyUpdate {
        room_id: RoomId,
        selected: usize,
        ready: usize,
        required: usize,
    },

    /// Authoritative slot state, sent on every transition.
    RoomStatusUpdate { room: RoomSnapshot },

    /// Lobby finished; the first buffer phase begins.
    TournamentStart {
        room_id: RoomId,
        mode: RoomMode,
        round: u32,
    },

    /// Timer tick during buffer and round phases.
    RoundState {
        room_id: RoomId,
        phase: Phase,
        round: u32,
        time_remaining: u64,
        damage_multiplier: f64,
        active_count: usize,
        ghost_count: usize,
        players: Vec<SlotSnapshot>,
    },

    /// Every pairing of the round.
    Matches {
        room_id: RoomId,
        round: u32,
        matches: Vec<MatchSummary>,
    },

    /// The receiving player's own pairing.
    MatchAssign {
        match_id: MatchId,
        round: u32,
        your_seat: SeatId,
        opponent: OpponentInfo,
    },

    /// A match was finalized.
    MatchResult {
        match_id: MatchId,
        winner_id: SeatId,
        loser_id: SeatId,
        hp_lost: u32,
        auto_resolved: bool,
    },

    /// All matches of a round are done.
    RoundComplete {
        room_id: RoomId,
        round: u32,
        eliminated: Vec<SeatId>,
        active_count: usize,
        next_buffer: Option<u64>,
    },

    /// The room finished; `winner` is the last live seat.
    TournamentEnd {
        room_id: RoomId,
        winner: Option<SlotSnapshot>,
    },

    /// Reconnection token for the receiving connection.
    SessionIssued {
        token: String,
        room_id: RoomId,
        seat: SeatId,
    },

    /// A reconnect succeeded.
    Reconnected { room_id: RoomId, seat: SeatId },
}

impl ServerEvent {
    /// Short event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Error { .. } => "error",
            Self::QueueStatus { .. } => "queueStatus",
            Self::WaitingRoomUpdate { .. } => "waitingRoomUpdate",
            Self::GameStarting { .. } => "gameStarting",
            Self::ProceedToRules { .. } => "proceedToRules",
            Self::LobbyUpdate { .. } => "lobbyUpdate",
            Self::RoomStatusUpdate { .. } => "roomStatusUpdate",
            Self::TournamentStart { .. } => "tournamentStart",
            Self::RoundState { .. } => "roundState",
            Self::Matches { .. } => "matches",
            Self::MatchAssign { .. } => "matchAssign",
            Self::MatchResult { .. } => "matchResult",
            Self::RoundComplete { .. } => "roundComplete",
            Self::TournamentEnd { .. } => "tournamentEnd",
            Self::SessionIssued { .. } => "sessionIssued",
            Self::Reconnected { .. } => "reconnected",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
