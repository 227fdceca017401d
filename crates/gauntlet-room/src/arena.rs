//! The arena: every room, the matchmaker, and the session table behind one
//! synchronous event-driven state machine.
//!
//! The arena never blocks and never awaits. Each call handles one inbound
//! event or timer firing to completion and returns the frames to deliver,
//! so room state changes strictly in event-arrival order. The server runs
//! one arena inside a single actor task.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gauntlet_combat::{BattleConfig, BuiltinHeroes, HeroCatalog, Side, resolve_battle};
use gauntlet_protocol::{ClientEvent, MatchId, Phase, RoomId, SeatId, ServerEvent};
use gauntlet_session::{SessionConfig, SessionManager};
use gauntlet_tick::{Scheduler, TimerFired, TimerKind};
use gauntlet_transport::ConnectionId;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, info, trace, warn};

use crate::bracket::generate_bracket;
use crate::economy::{record_loss, record_win};
use crate::matchmaker::DuoPlacement;
use crate::schedule::{damage_multiplier, scaled_penalty};
use crate::{
    Match, Matchmaker, Resolution, Room, RoomError, RoomRegistry, Standing, TournamentConfig,
};

/// A frame addressed to one connection.
pub type Outbound = (ConnectionId, ServerEvent);

const TICK: Duration = Duration::from_secs(1);

/// Owns all tournament state.
pub struct Arena {
    config: TournamentConfig,
    registry: RoomRegistry,
    matchmaker: Matchmaker,
    sessions: SessionManager,
    scheduler: Box<dyn Scheduler>,
    catalog: Box<dyn HeroCatalog>,
    rng: Box<dyn RngCore + Send>,
    /// Every connection past the handshake, with its display name.
    names: HashMap<ConnectionId, String>,
    outbox: Vec<Outbound>,
}

impl Arena {
    /// Creates an arena with the built-in heroes and an OS-seeded RNG.
    pub fn new(
        config: TournamentConfig,
        session_config: SessionConfig,
        scheduler: impl Scheduler + 'static,
    ) -> Self {
        Self {
            config,
            registry: RoomRegistry::new(),
            matchmaker: Matchmaker::new(),
            sessions: SessionManager::new(session_config),
            scheduler: Box::new(scheduler),
            catalog: Box::new(BuiltinHeroes),
            rng: Box::new(StdRng::from_os_rng()),
            names: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    /// Replaces the RNG used for pairings, ghost picks, and coin flips.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Makes pairings and coin flips reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_catalog(mut self, catalog: impl HeroCatalog + 'static) -> Self {
        self.catalog = Box::new(catalog);
        self
    }

    // -- accessors --------------------------------------------------------

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        self.registry.get(room_id)
    }

    pub fn room_of(&self, connection: ConnectionId) -> Option<RoomId> {
        self.registry.room_of(connection)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.registry.rooms()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// 1-based duo queue position of `connection`.
    pub fn queued(&self, connection: ConnectionId) -> Option<usize> {
        self.matchmaker.position(connection)
    }

    // -- entry points -----------------------------------------------------

    /// Registers a connection that completed the handshake.
    pub fn connect(&mut self, connection: ConnectionId, display_name: &str) {
        let name = display_name.trim();
        let name = if name.is_empty() {
            default_name(connection)
        } else {
            name.to_owned()
        };
        debug!(%connection, %name, "connection registered");
        self.names.insert(connection, name);
    }

    /// Applies one client event. Rejected events change nothing.
    pub fn handle_event(
        &mut self,
        connection: ConnectionId,
        event: ClientEvent,
        now: Instant,
    ) -> Vec<Outbound> {
        if !self.names.contains_key(&connection) {
            debug!(%connection, event = event.kind(), "event from unknown connection dropped");
            return Vec::new();
        }

        let kind = event.kind();
        let result = match event {
            ClientEvent::Hello { .. } => Ok(()),
            ClientEvent::RequestMatch { name } => self.request_match(connection, name, now),
            ClientEvent::RequestTournament { name } => {
                self.request_tournament(connection, name, now)
            }
            ClientEvent::UpdateName { name } => self.update_name(connection, name),
            ClientEvent::SelectHero { hero_id } => self.select_hero(connection, hero_id),
            ClientEvent::PlayerReady => self.player_ready(connection),
            ClientEvent::ClientBattleResult {
                match_id,
                winner_id,
                hp_lost,
            } => self.client_battle_result(connection, match_id, winner_id, hp_lost),
            ClientEvent::LeaveRoom => self.leave_room(connection),
            ClientEvent::Disconnect => self.disconnect(connection, now),
            ClientEvent::Reconnect { token } => self.reconnect(connection, &token, now),
        };
        if let Err(e) = result {
            debug!(%connection, event = kind, error = %e, "event ignored");
        }
        self.drain()
    }

    /// Handles a timer firing. Stale handles are ignored.
    pub fn handle_timer(&mut self, fired: TimerFired) -> Vec<Outbound> {
        let room_id = fired.room;
        let current = self.registry.get(room_id).and_then(|r| r.timer);
        if current != Some(fired.handle) {
            trace!(%room_id, kind = ?fired.kind, "stale timer ignored");
            return Vec::new();
        }
        if let Some(room) = self.registry.get_mut(room_id) {
            room.timer = None;
        }

        let result = match fired.kind {
            TimerKind::Countdown => self.countdown_elapsed(room_id),
            TimerKind::BufferTick => self.buffer_tick(room_id),
            TimerKind::RoundTick => self.round_tick(room_id),
        };
        if let Err(e) = result {
            debug!(%room_id, kind = ?fired.kind, error = %e, "timer ignored");
        }
        self.drain()
    }

    /// The socket closed. Same as a `disconnect` event, then the connection
    /// is forgotten.
    pub fn connection_closed(&mut self, connection: ConnectionId, now: Instant) -> Vec<Outbound> {
        if let Err(e) = self.disconnect(connection, now) {
            debug!(%connection, error = %e, "disconnect cleanup failed");
        }
        self.names.remove(&connection);
        self.drain()
    }

    /// Purges lapsed sessions and forfeits their seats.
    pub fn sweep_sessions(&mut self, now: Instant) -> Vec<Outbound> {
        for session in self.sessions.sweep_at(now) {
            let room_id = session.room_id;
            let seat = session.snapshot.seat;
            let Some(room) = self.registry.get(room_id) else {
                continue;
            };
            let detached = room.phase.is_running()
                && room.slot(seat).is_some_and(|slot| !slot.is_connected());
            if detached {
                info!(%room_id, %seat, "reconnection window lapsed, forfeiting");
                self.forfeit(room_id, seat);
                self.broadcast_status(room_id);
            }
            self.maybe_teardown(room_id);
        }
        self.drain()
    }

    // -- matchmaking ------------------------------------------------------

    fn request_match(
        &mut self,
        connection: ConnectionId,
        name: Option<String>,
        now: Instant,
    ) -> Result<(), RoomError> {
        let name = self.resolve_name(connection, name);
        let names = &self.names;
        let placement = self.matchmaker.request_duo(
            &mut self.registry,
            connection,
            name,
            &self.config,
            |c| names.contains_key(&c),
        )?;

        match placement {
            DuoPlacement::Queued { position, waiting } => {
                self.send(
                    connection,
                    ServerEvent::QueueStatus {
                        queued: true,
                        position,
                        waiting,
                    },
                );
            }
            DuoPlacement::Backfilled { room_id, .. } => {
                self.issue_session(room_id, connection, now);
                if let Some(event) = self.proceed_to_rules(room_id) {
                    self.send(connection, event);
                }
                self.broadcast_lobby_update(room_id);
                self.broadcast_status(room_id);
            }
            DuoPlacement::Paired { room_id, seats } => {
                let waiting = self.matchmaker.queue_len();
                for (conn, _) in seats {
                    self.send(
                        conn,
                        ServerEvent::QueueStatus {
                            queued: false,
                            position: 0,
                            waiting,
                        },
                    );
                    self.issue_session(room_id, conn, now);
                }
                self.open_lobby(room_id);
            }
        }
        Ok(())
    }

    fn request_tournament(
        &mut self,
        connection: ConnectionId,
        name: Option<String>,
        now: Instant,
    ) -> Result<(), RoomError> {
        let name = self.resolve_name(connection, name);
        let placement =
            self.matchmaker
                .request_bracket(&mut self.registry, connection, name, &self.config)?;
        let room_id = placement.room_id;

        self.issue_session(room_id, connection, now);
        self.broadcast_waiting_room(room_id);
        self.broadcast_status(room_id);
        self.start_countdown_if_full(room_id);
        Ok(())
    }

    /// Arms the countdown of a waiting bracket room that just filled up.
    /// A room whose countdown is already running is left alone.
    fn start_countdown_if_full(&mut self, room_id: RoomId) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        if room.phase != Phase::Waiting || !room.is_full() || room.timer.is_some() {
            return;
        }
        let countdown = self.config.bracket_countdown;
        info!(%room_id, ?countdown, "bracket room full, countdown started");
        self.broadcast(
            room_id,
            ServerEvent::GameStarting {
                room_id,
                countdown: countdown.as_secs(),
            },
        );
        self.arm_timer(room_id, TimerKind::Countdown, countdown);
    }

    fn countdown_elapsed(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let room = self.room_mut(room_id)?;
        room.transition(Phase::Lobby)?;
        self.open_lobby(room_id);
        Ok(())
    }

    /// Announces hero selection, once per room.
    fn open_lobby(&mut self, room_id: RoomId) {
        let Some(room) = self.registry.get_mut(room_id) else {
            return;
        };
        if !room.rules_sent {
            room.rules_sent = true;
            if let Some(event) = self.proceed_to_rules(room_id) {
                self.broadcast(room_id, event);
            }
        }
        self.broadcast_lobby_update(room_id);
        self.broadcast_status(room_id);
    }

    // -- lobby ------------------------------------------------------------

    fn update_name(&mut self, connection: ConnectionId, name: String) -> Result<(), RoomError> {
        let name = name.trim().to_owned();
        if name.is_empty() {
            return Err(RoomError::InvalidState("blank name".into()));
        }
        self.names.insert(connection, name.clone());

        let Some(room_id) = self.registry.room_of(connection) else {
            return Ok(());
        };
        let room = self.room_mut(room_id)?;
        let slot = room
            .slot_for_mut(connection)
            .ok_or(RoomError::NotInRoom(connection))?;
        slot.name = name;
        if room.phase == Phase::Waiting {
            self.broadcast_waiting_room(room_id);
        }
        self.broadcast_status(room_id);
        Ok(())
    }

    fn select_hero(&mut self, connection: ConnectionId, hero_id: String) -> Result<(), RoomError> {
        let room_id = self
            .registry
            .room_of(connection)
            .ok_or(RoomError::NotInRoom(connection))?;
        if !self.catalog.contains(&hero_id) {
            warn!(%connection, %hero_id, "unknown hero selected");
            return Err(RoomError::UnknownHero(hero_id));
        }
        let room = self.lobby_mut(room_id)?;
        let slot = room
            .slot_for_mut(connection)
            .ok_or(RoomError::NotInRoom(connection))?;
        debug!(%room_id, seat = %slot.seat, %hero_id, "hero selected");
        slot.hero_id = Some(hero_id);
        self.lobby_changed(room_id)
    }

    fn player_ready(&mut self, connection: ConnectionId) -> Result<(), RoomError> {
        let room_id = self
            .registry
            .room_of(connection)
            .ok_or(RoomError::NotInRoom(connection))?;
        let room = self.lobby_mut(room_id)?;
        let slot = room
            .slot_for_mut(connection)
            .ok_or(RoomError::NotInRoom(connection))?;
        if slot.hero_id.is_none() {
            return Err(RoomError::InvalidState(format!(
                "seat {} is not ready to play without a hero",
                slot.seat
            )));
        }
        slot.ready = true;
        self.lobby_changed(room_id)
    }

    fn lobby_changed(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        self.broadcast_lobby_update(room_id);
        self.broadcast_status(room_id);

        let room = self.room_mut(room_id)?;
        if room.phase != Phase::Lobby || !room.lobby_complete() {
            return Ok(());
        }
        let (mode, round) = (room.mode, room.current_round);
        info!(%room_id, %mode, "lobby complete, tournament starting");
        self.broadcast(
            room_id,
            ServerEvent::TournamentStart {
                room_id,
                mode,
                round,
            },
        );
        self.start_buffer(room_id)
    }

    // -- buffer / round ---------------------------------------------------

    fn start_buffer(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let buffer = self.config.buffer_duration.as_secs();
        let room = self.room_mut(room_id)?;
        room.transition(Phase::Buffer)?;
        room.remaining_secs = buffer;
        room.elapsed_secs = 0;

        self.arm_timer(room_id, TimerKind::BufferTick, TICK);
        self.broadcast_status(room_id);
        self.broadcast_round_state(room_id);
        Ok(())
    }

    fn buffer_tick(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let room = self.room_mut(room_id)?;
        if room.phase != Phase::Buffer {
            return Err(RoomError::InvalidState(format!("buffer tick in {}", room.phase)));
        }
        room.remaining_secs = room.remaining_secs.saturating_sub(1);
        if room.remaining_secs == 0 {
            return self.start_round(room_id);
        }
        self.broadcast_round_state(room_id);
        self.arm_timer(room_id, TimerKind::BufferTick, TICK);
        Ok(())
    }

    fn start_round(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let room = self
            .registry
            .get(room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        let (live, ghosts) = (room.live_seats(), room.ghost_seats());
        let bracket = generate_bracket(&live, &ghosts, &mut *self.rng);
        let matches: Vec<Match> = bracket
            .pairings
            .iter()
            .map(|p| Match::new(self.registry.next_match_id(), p.player1, p.player2, p.ghost))
            .collect();

        let round_secs = self.config.round_duration.as_secs();
        let room = self.room_mut(room_id)?;
        room.transition(Phase::Round)?;
        room.matches = matches.clone();
        room.remaining_secs = round_secs;
        room.elapsed_secs = 0;
        let round = room.current_round;
        info!(%room_id, round, matches = matches.len(), "round started");
        if let Some(seat) = bracket.bye {
            info!(%room_id, %seat, "no ghost available, seat sits the round out");
        }

        self.arm_timer(room_id, TimerKind::RoundTick, TICK);
        self.broadcast_status(room_id);
        self.broadcast(
            room_id,
            ServerEvent::Matches {
                room_id,
                round,
                matches: matches.iter().map(Match::summary).collect(),
            },
        );
        for m in &matches {
            self.send_match_assign(room_id, m, None);
        }
        self.broadcast_round_state(room_id);

        let penalty = self.config.auto_penalty_hp;
        for m in matches.iter().filter(|m| m.ghost.is_some()) {
            let winner = if self.rng.random_bool(0.5) {
                m.player1
            } else {
                m.player2
            };
            self.settle_logged(room_id, m.id, winner, penalty, true);
        }

        if self.config.resolution == Resolution::ServerSimulated {
            for m in matches.iter().filter(|m| m.ghost.is_none()) {
                match self.simulate_match(room_id, m) {
                    Ok(winner) => self.settle_logged(room_id, m.id, winner, penalty, false),
                    Err(e) => warn!(%room_id, match_id = %m.id, error = %e, "simulation failed"),
                }
            }
        }

        self.complete_round_if_done(room_id);
        Ok(())
    }

    fn simulate_match(&self, room_id: RoomId, m: &Match) -> Result<SeatId, RoomError> {
        let room = self.room(room_id).ok_or(RoomError::NotFound(room_id))?;
        let hero = |seat: SeatId| {
            room.slot(seat)
                .and_then(|s| s.hero_id.clone())
                .ok_or_else(|| RoomError::InvalidState(format!("seat {seat} has no hero")))
        };
        let report = resolve_battle(
            self.catalog.as_ref(),
            &hero(m.player1)?,
            &hero(m.player2)?,
            &BattleConfig::default(),
        )?;
        debug!(%room_id, match_id = %m.id, ticks = report.ticks, "battle simulated");
        Ok(match report.winner {
            Side::First => m.player1,
            Side::Second => m.player2,
        })
    }

    fn round_tick(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let room = self.room_mut(room_id)?;
        if room.phase != Phase::Round {
            return Err(RoomError::InvalidState(format!("round tick in {}", room.phase)));
        }
        room.remaining_secs = room.remaining_secs.saturating_sub(1);
        room.elapsed_secs += 1;
        if room.remaining_secs == 0 {
            return self.expire_round(room_id);
        }
        self.broadcast_round_state(room_id);
        self.arm_timer(room_id, TimerKind::RoundTick, TICK);
        Ok(())
    }

    /// Auto-resolves every open match with a random winner.
    fn expire_round(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let room = self.room(room_id).ok_or(RoomError::NotFound(room_id))?;
        let multiplier = damage_multiplier(room.elapsed_secs, &self.config);
        let penalty = scaled_penalty(self.config.auto_penalty_hp, multiplier);
        let open: Vec<(MatchId, SeatId, SeatId)> = room
            .matches
            .iter()
            .filter(|m| !m.completed)
            .map(|m| (m.id, m.player1, m.player2))
            .collect();
        info!(%room_id, open = open.len(), penalty, "round timer expired");

        for (match_id, player1, player2) in open {
            let winner = if self.rng.random_bool(0.5) {
                player1
            } else {
                player2
            };
            self.settle_logged(room_id, match_id, winner, penalty, true);
        }
        self.complete_round_if_done(room_id);
        Ok(())
    }

    // -- results ----------------------------------------------------------

    fn client_battle_result(
        &mut self,
        connection: ConnectionId,
        match_id: MatchId,
        winner: SeatId,
        hp_lost: u32,
    ) -> Result<(), RoomError> {
        let room_id = self
            .registry
            .room_of(connection)
            .ok_or(RoomError::NotInRoom(connection))?;
        let room = self.room(room_id).ok_or(RoomError::NotFound(room_id))?;
        let seat = room
            .seat_of(connection)
            .ok_or(RoomError::NotInRoom(connection))?;
        let m = room
            .find_match(match_id)
            .ok_or(RoomError::UnknownMatch(match_id))?;
        if !m.involves(seat) {
            warn!(%room_id, %seat, %match_id, "result reported by a non-participant");
            return Err(RoomError::NotInMatch(seat, match_id));
        }
        self.settle_match(room_id, match_id, winner, hp_lost, false)
    }

    /// Records a match result, pays out, and runs the completion check.
    ///
    /// The first result for a match wins. Later calls return
    /// [`RoomError::MatchCompleted`] and change nothing.
    pub fn finalize_match(
        &mut self,
        room_id: RoomId,
        match_id: MatchId,
        winner: SeatId,
        hp_lost: u32,
    ) -> Result<Vec<Outbound>, RoomError> {
        match self.settle_match(room_id, match_id, winner, hp_lost, false) {
            Ok(()) => Ok(self.drain()),
            Err(e) => {
                self.outbox.clear();
                Err(e)
            }
        }
    }

    fn settle_logged(
        &mut self,
        room_id: RoomId,
        match_id: MatchId,
        winner: SeatId,
        hp_lost: u32,
        auto_resolved: bool,
    ) {
        if let Err(e) = self.settle_match(room_id, match_id, winner, hp_lost, auto_resolved) {
            debug!(%room_id, %match_id, error = %e, "auto-resolution skipped");
        }
    }

    fn settle_match(
        &mut self,
        room_id: RoomId,
        match_id: MatchId,
        winner: SeatId,
        hp_lost: u32,
        auto_resolved: bool,
    ) -> Result<(), RoomError> {
        let room = self.room_mut(room_id)?;
        if room.phase != Phase::Round {
            return Err(RoomError::InvalidState(format!(
                "match result in {}",
                room.phase
            )));
        }
        let m = room
            .find_match_mut(match_id)
            .ok_or(RoomError::UnknownMatch(match_id))?;
        if m.completed {
            return Err(RoomError::MatchCompleted(match_id));
        }
        let loser = m
            .opponent_of(winner)
            .ok_or(RoomError::NotInMatch(winner, match_id))?;
        m.completed = true;
        m.winner = Some(winner);

        if let Some(slot) = room.slot_mut(winner).filter(|s| s.is_live()) {
            record_win(slot);
        }
        if let Some(slot) = room.slot_mut(loser).filter(|s| s.is_live()) {
            record_loss(slot, hp_lost);
        }
        info!(%room_id, %match_id, %winner, %loser, hp_lost, auto_resolved, "match finalized");

        self.broadcast(
            room_id,
            ServerEvent::MatchResult {
                match_id,
                winner_id: winner,
                loser_id: loser,
                hp_lost,
                auto_resolved,
            },
        );
        self.complete_round_if_done(room_id);
        Ok(())
    }

    /// Advances the room once every match of the round is done.
    ///
    /// Eliminates seats at 0 HP, then either loops back to the buffer or
    /// ends the tournament. A no-op unless the room is in `round` with no
    /// open match, so calling it again after it advanced does nothing.
    pub fn check_round_completion(&mut self, room_id: RoomId) -> Vec<Outbound> {
        self.complete_round_if_done(room_id);
        self.drain()
    }

    fn complete_round_if_done(&mut self, room_id: RoomId) {
        let buffer = self.config.buffer_duration.as_secs();
        let Some(room) = self.registry.get_mut(room_id) else {
            return;
        };
        if room.phase != Phase::Round || !room.all_matches_completed() {
            return;
        }

        let eliminated = room.eliminate_depleted();
        let active_count = room.live_count();
        let round = room.current_round;
        let next_round = active_count > 1;
        info!(%room_id, round, ?eliminated, active_count, "round complete");

        self.broadcast(
            room_id,
            ServerEvent::RoundComplete {
                room_id,
                round,
                eliminated,
                active_count,
                next_buffer: next_round.then_some(buffer),
            },
        );

        if next_round {
            if let Some(room) = self.registry.get_mut(room_id) {
                room.current_round += 1;
            }
            if let Err(e) = self.start_buffer(room_id) {
                warn!(%room_id, error = %e, "could not start next buffer");
            }
        } else {
            self.complete_tournament(room_id);
        }
    }

    fn complete_tournament(&mut self, room_id: RoomId) {
        self.cancel_timer(room_id);
        let Some(room) = self.registry.get_mut(room_id) else {
            return;
        };
        if let Err(e) = room.transition(Phase::Complete) {
            warn!(%room_id, error = %e, "forcing completion");
            room.phase = Phase::Complete;
        }
        let winner = room.slots().find(|s| s.is_live()).map(|s| s.snapshot());
        info!(
            %room_id,
            winner = winner.as_ref().map(|w| w.name.as_str()).unwrap_or("none"),
            "tournament complete"
        );

        self.broadcast_status(room_id);
        self.broadcast(room_id, ServerEvent::TournamentEnd { room_id, winner });
        self.teardown(room_id);
    }

    // -- leaving / sessions -----------------------------------------------

    fn leave_room(&mut self, connection: ConnectionId) -> Result<(), RoomError> {
        if self.matchmaker.remove(connection) {
            let waiting = self.matchmaker.queue_len();
            self.send(
                connection,
                ServerEvent::QueueStatus {
                    queued: false,
                    position: 0,
                    waiting,
                },
            );
            return Ok(());
        }
        let room_id = self
            .registry
            .room_of(connection)
            .ok_or(RoomError::NotInRoom(connection))?;
        self.sessions.destroy_for_connection(connection);
        self.depart(room_id, connection, true)
    }

    fn disconnect(&mut self, connection: ConnectionId, now: Instant) -> Result<(), RoomError> {
        if self.matchmaker.remove(connection) {
            debug!(%connection, "dropped from duo queue");
            return Ok(());
        }
        let Some(room_id) = self.registry.room_of(connection) else {
            return Ok(());
        };
        if let Err(e) = self.sessions.mark_disconnected_at(now, connection) {
            debug!(%connection, error = %e, "no session to hold open");
        }
        self.depart(room_id, connection, false)
    }

    /// Takes `connection` out of its room. A permanent departure from a
    /// running room forfeits the seat.
    fn depart(
        &mut self,
        room_id: RoomId,
        connection: ConnectionId,
        permanent: bool,
    ) -> Result<(), RoomError> {
        self.registry.unbind(connection);
        let room = self.room_mut(room_id)?;
        let phase = room.phase;

        if phase.is_pregame() {
            let seat = room
                .seat_of(connection)
                .ok_or(RoomError::NotInRoom(connection))?;
            room.remove(seat);
            info!(%room_id, %seat, %phase, "player left before the tournament");
            if phase == Phase::Waiting {
                if room.timer.is_some() {
                    info!(%room_id, "countdown cancelled");
                }
                self.cancel_timer(room_id);
                self.broadcast_waiting_room(room_id);
            } else {
                self.broadcast_lobby_update(room_id);
            }
            self.broadcast_status(room_id);
        } else if phase.is_running() {
            let seat = room
                .detach(connection)
                .ok_or(RoomError::NotInRoom(connection))?;
            info!(%room_id, %seat, permanent, "player dropped mid-tournament");
            if permanent {
                self.forfeit(room_id, seat);
            }
            self.broadcast_status(room_id);
        }

        self.maybe_teardown(room_id);
        Ok(())
    }

    /// Drops a seat to 0 HP and settles whatever it was playing.
    fn forfeit(&mut self, room_id: RoomId, seat: SeatId) {
        let Some(room) = self.registry.get_mut(room_id) else {
            return;
        };
        let phase = room.phase;
        let round = room.current_round;
        let Some(slot) = room.slot_mut(seat).filter(|s| s.is_live()) else {
            return;
        };
        let remaining = slot.hp.current;
        slot.hp.lose(remaining);
        info!(%room_id, %seat, %phase, "seat forfeited");

        match phase {
            Phase::Round => {
                let open = room
                    .open_match_for(seat)
                    .and_then(|m| Some((m.id, m.opponent_of(seat)?)));
                if let Some((match_id, opponent)) = open {
                    self.settle_logged(room_id, match_id, opponent, 0, true);
                }
            }
            Phase::Buffer => {
                slot.standing = Standing::Ghost {
                    eliminated_in_round: round,
                };
                if room.live_count() <= 1 {
                    self.complete_tournament(room_id);
                }
            }
            _ => {}
        }
    }

    fn reconnect(
        &mut self,
        connection: ConnectionId,
        token: &str,
        now: Instant,
    ) -> Result<(), RoomError> {
        if let Some(room_id) = self.registry.room_of(connection) {
            return Err(RoomError::AlreadyInRoom(connection, room_id));
        }
        let session = self.sessions.reconnect_at(now, token, connection)?;
        let room_id = session.room_id;
        let old_seat = session.snapshot.seat;
        let name = session.snapshot.name.clone();

        match self.rebind(room_id, old_seat, connection, name) {
            Ok(seat) => {
                if self.matchmaker.remove(connection) {
                    debug!(%connection, "left duo queue on reconnect");
                }
                info!(%room_id, %seat, %connection, "player reconnected");
                self.send(connection, ServerEvent::Reconnected { room_id, seat });
                self.resume(room_id, seat, connection);
                self.start_countdown_if_full(room_id);
                Ok(())
            }
            Err(e) => {
                self.sessions.destroy(token);
                Err(e)
            }
        }
    }

    /// Puts a returning connection back into its room: the same seat while
    /// the tournament runs, a fresh one before it starts.
    fn rebind(
        &mut self,
        room_id: RoomId,
        seat: SeatId,
        connection: ConnectionId,
        name: String,
    ) -> Result<SeatId, RoomError> {
        let (hp, gold) = (self.config.starting_hp, self.config.starting_gold);
        let room = self.room_mut(room_id)?;
        let seat = if room.phase.is_running() {
            room.attach(seat, connection)?;
            seat
        } else {
            room.join(connection, name, hp, gold)?
        };
        self.registry.bind(connection, room_id);
        Ok(seat)
    }

    /// Catches a reconnected player up on the room.
    fn resume(&mut self, room_id: RoomId, seat: SeatId, connection: ConnectionId) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        let phase = room.phase;
        let open = room.open_match_for(seat).cloned();
        match phase {
            Phase::Waiting => self.broadcast_waiting_room(room_id),
            Phase::Lobby => {
                if let Some(event) = self.proceed_to_rules(room_id) {
                    self.send(connection, event);
                }
                self.broadcast_lobby_update(room_id);
            }
            Phase::Buffer | Phase::Round => {
                if let Some(event) = self.round_state(room_id) {
                    self.send(connection, event);
                }
                if let Some(m) = open {
                    self.send_match_assign(room_id, &m, Some(connection));
                }
            }
            Phase::Complete => {}
        }
        self.broadcast_status(room_id);
    }

    fn issue_session(&mut self, room_id: RoomId, connection: ConnectionId, now: Instant) {
        let Some(snapshot) = self
            .registry
            .get(room_id)
            .and_then(|r| r.slot_for(connection))
            .map(|s| s.snapshot())
        else {
            return;
        };
        let seat = snapshot.seat;
        let token = self
            .sessions
            .create_session_at(now, connection, room_id, snapshot)
            .token
            .clone();
        self.send(
            connection,
            ServerEvent::SessionIssued {
                token,
                room_id,
                seat,
            },
        );
    }

    // -- teardown ---------------------------------------------------------

    fn maybe_teardown(&mut self, room_id: RoomId) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        if room.connected_count() == 0 && self.sessions.pending_for_room(room_id) == 0 {
            info!(%room_id, "room abandoned");
            self.teardown(room_id);
        }
    }

    fn teardown(&mut self, room_id: RoomId) {
        self.cancel_timer(room_id);
        if self.registry.remove(room_id).is_some() {
            let dropped = self.sessions.destroy_for_room(room_id);
            debug!(%room_id, sessions = dropped.len(), "room torn down");
        }
    }

    // -- timers -----------------------------------------------------------

    /// Replaces the room's timer. The old handle is always cleared first.
    fn arm_timer(&mut self, room_id: RoomId, kind: TimerKind, delay: Duration) {
        let Some(room) = self.registry.get_mut(room_id) else {
            return;
        };
        if let Some(old) = room.timer.take() {
            self.scheduler.cancel(old);
        }
        room.timer = Some(self.scheduler.schedule(room_id, kind, delay));
    }

    fn cancel_timer(&mut self, room_id: RoomId) {
        if let Some(handle) = self.registry.get_mut(room_id).and_then(|r| r.timer.take()) {
            self.scheduler.cancel(handle);
        }
    }

    // -- outbound ---------------------------------------------------------

    fn send(&mut self, connection: ConnectionId, event: ServerEvent) {
        self.outbox.push((connection, event));
    }

    fn broadcast(&mut self, room_id: RoomId, event: ServerEvent) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        for conn in room.connections() {
            self.outbox.push((conn, event.clone()));
        }
    }

    /// Sends the room snapshot and refreshes every bound session's copy.
    fn broadcast_status(&mut self, room_id: RoomId) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        for slot in room.slots() {
            if let Some(conn) = slot.connection {
                self.sessions.refresh_snapshot(conn, slot.snapshot());
            }
        }
        let snapshot = room.snapshot();
        self.broadcast(room_id, ServerEvent::RoomStatusUpdate { room: snapshot });
    }

    fn broadcast_waiting_room(&mut self, room_id: RoomId) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        let event = ServerEvent::WaitingRoomUpdate {
            room_id,
            occupancy: room.occupancy(),
            capacity: room.capacity,
            players: room.slots().map(|s| s.name.clone()).collect(),
        };
        self.broadcast(room_id, event);
    }

    fn broadcast_lobby_update(&mut self, room_id: RoomId) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        let event = ServerEvent::LobbyUpdate {
            room_id,
            selected: room.selected_count(),
            ready: room.ready_count(),
            required: room.capacity,
        };
        self.broadcast(room_id, event);
    }

    fn broadcast_round_state(&mut self, room_id: RoomId) {
        if let Some(event) = self.round_state(room_id) {
            self.broadcast(room_id, event);
        }
    }

    fn round_state(&self, room_id: RoomId) -> Option<ServerEvent> {
        let room = self.registry.get(room_id)?;
        let damage_multiplier = if room.phase == Phase::Round {
            damage_multiplier(room.elapsed_secs, &self.config)
        } else {
            1.0
        };
        Some(ServerEvent::RoundState {
            room_id,
            phase: room.phase,
            round: room.current_round,
            time_remaining: room.remaining_secs,
            damage_multiplier,
            active_count: room.live_count(),
            ghost_count: room.ghost_seats().len(),
            players: room.slots().map(|s| s.snapshot()).collect(),
        })
    }

    fn proceed_to_rules(&self, room_id: RoomId) -> Option<ServerEvent> {
        let room = self.registry.get(room_id)?;
        Some(ServerEvent::ProceedToRules {
            room_id,
            mode: room.mode,
            capacity: room.capacity,
        })
    }

    /// Tells each live, connected side of `m` who it faces. With `only`,
    /// just that connection is told.
    fn send_match_assign(&mut self, room_id: RoomId, m: &Match, only: Option<ConnectionId>) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        let round = room.current_round;
        let mut frames = Vec::new();
        for (seat, other) in [(m.player1, m.player2), (m.player2, m.player1)] {
            let (Some(me), Some(them)) = (room.slot(seat), room.slot(other)) else {
                continue;
            };
            let Some(conn) = me.connection.filter(|_| me.is_live()) else {
                continue;
            };
            if only.is_some_and(|o| o != conn) {
                continue;
            }
            frames.push((
                conn,
                ServerEvent::MatchAssign {
                    match_id: m.id,
                    round,
                    your_seat: seat,
                    opponent: them.opponent_info(),
                },
            ));
        }
        self.outbox.extend(frames);
    }

    // -- helpers ----------------------------------------------------------

    fn drain(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn room_mut(&mut self, room_id: RoomId) -> Result<&mut Room, RoomError> {
        self.registry
            .get_mut(room_id)
            .ok_or(RoomError::NotFound(room_id))
    }

    fn lobby_mut(&mut self, room_id: RoomId) -> Result<&mut Room, RoomError> {
        let room = self.room_mut(room_id)?;
        if room.phase != Phase::Lobby {
            return Err(RoomError::InvalidState(format!(
                "room {room_id} is in {}, not lobby",
                room.phase
            )));
        }
        Ok(room)
    }

    fn resolve_name(&mut self, connection: ConnectionId, requested: Option<String>) -> String {
        match requested.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()) {
            Some(name) => {
                self.names.insert(connection, name.clone());
                name
            }
            None => self
                .names
                .get(&connection)
                .cloned()
                .unwrap_or_else(|| default_name(connection)),
        }
    }
}

fn default_name(connection: ConnectionId) -> String {
    format!("Player_{}", connection.into_inner())
}
