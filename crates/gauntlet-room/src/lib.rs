//! Tournament rooms for Gauntlet.
//!
//! Everything that decides who plays whom, when, and for how much lives
//! here, behind one synchronous [`Arena`]. The arena owns:
//!
//! - [`RoomRegistry`]: every live [`Room`], keyed by id, and which
//!   connection sits where.
//! - [`Matchmaker`]: the duo queue and bracket placement.
//! - the per-room phase machine (waiting → lobby → buffer ⇄ round →
//!   complete), driven by client events and [`gauntlet_tick`] timers.
//! - [`generate_bracket`]: shuffled pairings with ghost byes.
//! - the economy ([`winner_reward`], [`loser_reward`], [`interest`]) and
//!   the round's [`damage_multiplier`].
//! - a [`gauntlet_session::SessionManager`] for reconnection.
//!
//! ```text
//! ClientEvent / TimerFired ──→ Arena ──→ Vec<(ConnectionId, ServerEvent)>
//! ```
//!
//! The arena performs no I/O. The caller delivers what it returns.

mod arena;
mod bracket;
mod config;
mod economy;
mod error;
mod matchmaker;
mod registry;
mod room;
mod schedule;

pub use arena::{Arena, Outbound};
pub use bracket::{Bracket, Pairing, generate_bracket};
pub use config::{Resolution, TournamentConfig};
pub use economy::{interest, loser_reward, record_loss, record_win, winner_reward};
pub use error::RoomError;
pub use matchmaker::{BracketPlacement, DuoPlacement, Matchmaker};
pub use registry::RoomRegistry;
pub use room::{Match, PlayerSlot, Room, Standing};
pub use schedule::{damage_multiplier, scaled_penalty};
