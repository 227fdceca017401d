//! # Gauntlet
//!
//! Live multiplayer battle-royale tournament server.
//!
//! Players connect over WebSocket, queue into two-player duo rooms or
//! eight-player bracket rooms, pick heroes, and fight round after round
//! until one player has HP left. The server owns every room's phase, its
//! timers, the pairings, and the economy; clients only render.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gauntlet::prelude::*;
//!
//! struct AnyoneAuth;
//!
//! impl Authenticator for AnyoneAuth {
//!     async fn authenticate(&self, _token: &str) -> Result<Identity, SessionError> {
//!         Ok(Identity { user_id: 0, display_name: String::new() })
//!     }
//! }
//!
//! # async fn run() -> Result<(), GauntletError> {
//! let server = GauntletServer::<AnyoneAuth, gauntlet::protocol::JsonCodec>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(AnyoneAuth)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::GauntletError;
pub use server::{GauntletServer, GauntletServerBuilder};

pub use gauntlet_combat as combat;
pub use gauntlet_protocol as protocol;
pub use gauntlet_room as room;
pub use gauntlet_session as session;
pub use gauntlet_tick as tick;
pub use gauntlet_transport as transport;

/// Everything needed to stand up a server.
pub mod prelude {
    pub use crate::{GauntletError, GauntletServer, GauntletServerBuilder};
    pub use gauntlet_protocol::{ClientEvent, PROTOCOL_VERSION, ServerEvent};
    pub use gauntlet_room::{Resolution, TournamentConfig};
    pub use gauntlet_session::{Authenticator, Identity, SessionConfig, SessionError};
}
