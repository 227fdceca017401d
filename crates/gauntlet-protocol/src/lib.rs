//! Wire protocol for Gauntlet.
//!
//! - **Types**: identity newtypes ([`RoomId`], [`SeatId`], [`MatchId`]),
//!   room [`Phase`] and [`RoomMode`], snapshots, and the two closed event
//!   unions [`ClientEvent`] and [`ServerEvent`].
//! - **Codec**: the [`Codec`] trait and [`JsonCodec`].
//! - **Errors**: [`ProtocolError`].
//!
//! Nothing in here knows about connections, rooms, or timers. Events are
//! validated at this boundary so the state machine only ever sees
//! well-formed input.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Arena (room state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, Hp, MatchId, MatchSummary, OpponentInfo, Phase, RoomId, RoomMode,
    RoomSnapshot, SeatId, ServerEvent, SlotSnapshot,
};

/// Version a client must announce in its `hello` frame.
pub const PROTOCOL_VERSION: u32 = 1;
