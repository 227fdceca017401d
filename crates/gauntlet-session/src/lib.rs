//! Player sessions for Gauntlet.
//!
//! A session outlives the connection it was created on. When a socket
//! drops mid-tournament the session stays behind for a fixed window, and a
//! client presenting its token on a fresh connection is rebound to the same
//! seat.
//!
//! 1. **Authentication**: the [`Authenticator`] hook the handshake calls.
//! 2. **Session tracking**: [`SessionManager`] maps tokens to sessions and
//!    connections to tokens.
//! 3. **Expiry**: [`SessionManager::sweep`] purges sessions whose window
//!    lapsed and hands them back so the room can forfeit the player.
//!
//! ```text
//! Arena (above)   ← creates sessions on join, forfeits on expiry
//!     ↕
//! Session Layer   ← token ↔ session ↔ connection
//!     ↕
//! Protocol / Transport (below)  ← RoomId, SlotSnapshot, ConnectionId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{Authenticator, Identity};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
