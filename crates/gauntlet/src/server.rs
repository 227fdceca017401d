//! `GauntletServer` builder, accept loop, and the arena actor.
//!
//! This is the entry point for running a Gauntlet tournament server. It ties
//! together all the layers: transport → protocol → session → room.
//!
//! ```text
//! conn task ──Command──┐
//! conn task ──Command──┼──→ arena actor ──ServerEvent──→ conn task outbox
//! TokioScheduler ──────┘        (one task owns every room)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use gauntlet_protocol::{ClientEvent, Codec, JsonCodec, ServerEvent};
use gauntlet_room::{Arena, Outbound, TournamentConfig};
use gauntlet_session::{Authenticator, SessionConfig};
use gauntlet_tick::{TimerFired, TokioScheduler};
use gauntlet_transport::{ConnectionId, Transport, WebSocketTransport};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::GauntletError;
use crate::handler::handle_connection;

/// Messages from connection tasks to the arena actor.
#[derive(Debug)]
pub(crate) enum Command {
    /// Handshake done; `outbox` receives every frame for this connection.
    Connect {
        connection: ConnectionId,
        display_name: String,
        outbox: mpsc::UnboundedSender<ServerEvent>,
    },
    Event {
        connection: ConnectionId,
        event: ClientEvent,
    },
    /// The socket is gone.
    Closed { connection: ConnectionId },
}

/// Shared server state passed to each connection handler task.
///
/// Room state is not in here. It lives inside the arena actor and is only
/// reachable through `commands`.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) commands: mpsc::UnboundedSender<Command>,
}

/// Builder for configuring and starting a Gauntlet server.
///
/// # Example
///
/// ```rust,ignore
/// use gauntlet::prelude::*;
///
/// let server = GauntletServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct GauntletServerBuilder {
    bind_addr: String,
    tournament_config: TournamentConfig,
    session_config: SessionConfig,
    seed: Option<u64>,
}

impl GauntletServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tournament_config: TournamentConfig::default(),
            session_config: SessionConfig::default(),
            seed: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets room timings and economy.
    pub fn tournament_config(mut self, config: TournamentConfig) -> Self {
        self.tournament_config = config;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Seeds pairings and coin flips for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Binds the listener and starts the arena actor.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<GauntletServer<A, JsonCodec>, GauntletError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let (scheduler, timers) = TokioScheduler::new();
        let sweep_every = self.session_config.sweep_interval;
        let mut arena = Arena::new(self.tournament_config, self.session_config, scheduler);
        if let Some(seed) = self.seed {
            arena = arena.with_seed(seed);
        }

        let (commands, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_arena(arena, command_rx, timers, sweep_every));

        let state = Arc::new(ServerState {
            auth,
            codec: JsonCodec,
            commands,
        });

        Ok(GauntletServer { transport, state })
    }
}

impl Default for GauntletServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Gauntlet server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GauntletServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl<A, C> GauntletServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> GauntletServerBuilder {
        GauntletServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), GauntletError> {
        tracing::info!("Gauntlet server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// The arena actor. Owns the [`Arena`] and every connection's outbox, and
/// applies commands, timer firings, and session sweeps one at a time.
async fn run_arena(
    mut arena: Arena,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut timers: mpsc::UnboundedReceiver<TimerFired>,
    sweep_every: std::time::Duration,
) {
    let mut outboxes: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>> = HashMap::new();
    let mut sweep = tokio::time::interval_at(Instant::now() + sweep_every, sweep_every);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frames = tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                let now = Instant::now().into_std();
                match command {
                    Command::Connect { connection, display_name, outbox } => {
                        outboxes.insert(connection, outbox);
                        arena.connect(connection, &display_name);
                        Vec::new()
                    }
                    Command::Event { connection, event } => {
                        arena.handle_event(connection, event, now)
                    }
                    Command::Closed { connection } => {
                        let frames = arena.connection_closed(connection, now);
                        outboxes.remove(&connection);
                        frames
                    }
                }
            }
            Some(fired) = timers.recv() => arena.handle_timer(fired),
            at = sweep.tick() => arena.sweep_sessions(at.into_std()),
        };
        deliver(&outboxes, frames);
    }

    tracing::info!("arena stopped");
}

fn deliver(
    outboxes: &HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    frames: Vec<Outbound>,
) {
    for (connection, event) in frames {
        match outboxes.get(&connection) {
            Some(outbox) => {
                // A closed outbox means the task is exiting; its Closed
                // command is already queued.
                let _ = outbox.send(event);
            }
            None => {
                tracing::trace!(%connection, kind = event.kind(), "no outbox, frame dropped");
            }
        }
    }
}
