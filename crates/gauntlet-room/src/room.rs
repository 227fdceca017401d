//! Rooms, the seats inside them, and the matches between seats.

use std::collections::{BTreeMap, HashMap};

use gauntlet_protocol::{
    Hp, MatchId, MatchSummary, OpponentInfo, Phase, RoomId, RoomMode, RoomSnapshot, SeatId,
    SlotSnapshot,
};
use gauntlet_tick::TimerHandle;
use gauntlet_transport::ConnectionId;
use tracing::info;

use crate::RoomError;

// ---------------------------------------------------------------------------
// PlayerSlot
// ---------------------------------------------------------------------------

/// Whether a seat still fights for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// In the tournament.
    Live,
    /// Eliminated. Still in the room as a non-damaging bye opponent.
    Ghost { eliminated_in_round: u32 },
}

/// One seat in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSlot {
    pub seat: SeatId,
    /// `None` while the player is disconnected or has left a running room.
    pub connection: Option<ConnectionId>,
    pub name: String,
    pub hero_id: Option<String>,
    pub ready: bool,
    pub hp: Hp,
    pub gold: u32,
    pub wins: u32,
    pub losses: u32,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub standing: Standing,
}

impl PlayerSlot {
    fn new(seat: SeatId, connection: ConnectionId, name: String, hp: u32, gold: u32) -> Self {
        Self {
            seat,
            connection: Some(connection),
            name,
            hero_id: None,
            ready: false,
            hp: Hp::full(hp),
            gold,
            wins: 0,
            losses: 0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            standing: Standing::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.standing, Standing::Live)
    }

    pub fn is_ghost(&self) -> bool {
        !self.is_live()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The wire view of this seat.
    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            seat: self.seat,
            name: self.name.clone(),
            hero_id: self.hero_id.clone(),
            ready: self.ready,
            hp: self.hp,
            gold: self.gold,
            eliminated: self.is_ghost(),
            is_ghost: self.is_ghost(),
            wins: self.wins,
            losses: self.losses,
            consecutive_wins: self.consecutive_wins,
            consecutive_losses: self.consecutive_losses,
            connected: self.is_connected(),
        }
    }

    /// What this seat's opponent is told about it.
    pub fn opponent_info(&self) -> OpponentInfo {
        OpponentInfo {
            seat: self.seat,
            name: self.name.clone(),
            hero_id: self.hero_id.clone(),
            is_ghost: self.is_ghost(),
        }
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// A pairing for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: MatchId,
    pub player1: SeatId,
    pub player2: SeatId,
    /// The ghost side of a bye, if any.
    pub ghost: Option<SeatId>,
    pub completed: bool,
    pub winner: Option<SeatId>,
}

impl Match {
    pub fn new(id: MatchId, player1: SeatId, player2: SeatId, ghost: Option<SeatId>) -> Self {
        Self {
            id,
            player1,
            player2,
            ghost,
            completed: false,
            winner: None,
        }
    }

    pub fn involves(&self, seat: SeatId) -> bool {
        self.player1 == seat || self.player2 == seat
    }

    /// The other participant, or `None` if `seat` is not in this match.
    pub fn opponent_of(&self, seat: SeatId) -> Option<SeatId> {
        if seat == self.player1 {
            Some(self.player2)
        } else if seat == self.player2 {
            Some(self.player1)
        } else {
            None
        }
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            match_id: self.id,
            player1: self.player1,
            player2: self.player2,
            ghost: self.ghost.is_some(),
            completed: self.completed,
            winner_id: self.winner,
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One isolated game session.
///
/// A room exclusively owns its seats and matches. Seat numbers come from a
/// per-room counter and are never reused, so the occupancy+1 rule holds
/// for rooms nobody has left.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub mode: RoomMode,
    pub phase: Phase,
    pub current_round: u32,
    pub capacity: usize,
    /// This round's pairings; replaced when the next round starts.
    pub matches: Vec<Match>,
    /// The room's single pending timer.
    pub timer: Option<TimerHandle>,
    /// Whole seconds left in the current buffer or round.
    pub remaining_secs: u64,
    /// Whole seconds elapsed in the current round.
    pub elapsed_secs: u64,
    /// Set once hero selection has been announced.
    pub rules_sent: bool,
    slots: BTreeMap<SeatId, PlayerSlot>,
    connections: HashMap<ConnectionId, SeatId>,
    next_seat: u32,
}

impl Room {
    pub fn new(id: RoomId, mode: RoomMode, phase: Phase, capacity: usize) -> Self {
        Self {
            id,
            mode,
            phase,
            current_round: 1,
            capacity,
            matches: Vec::new(),
            timer: None,
            remaining_secs: 0,
            elapsed_secs: 0,
            rules_sent: false,
            slots: BTreeMap::new(),
            connections: HashMap::new(),
            next_seat: 1,
        }
    }

    // -- seats ------------------------------------------------------------

    pub fn occupancy(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Seats a new player.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] once the room has left `waiting`/`lobby`
    /// - [`RoomError::RoomFull`] at capacity
    /// - [`RoomError::AlreadyInRoom`] if the connection is already seated
    pub fn join(
        &mut self,
        connection: ConnectionId,
        name: String,
        hp: u32,
        gold: u32,
    ) -> Result<SeatId, RoomError> {
        if !self.phase.is_pregame() {
            return Err(RoomError::InvalidState(format!(
                "room {} is in {}",
                self.id, self.phase
            )));
        }
        if self.is_full() {
            return Err(RoomError::RoomFull(self.id));
        }
        if self.connections.contains_key(&connection) {
            return Err(RoomError::AlreadyInRoom(connection, self.id));
        }

        let seat = SeatId(self.next_seat);
        self.next_seat += 1;
        self.slots
            .insert(seat, PlayerSlot::new(seat, connection, name, hp, gold));
        self.connections.insert(connection, seat);
        Ok(seat)
    }

    /// Removes a seat entirely.
    pub fn remove(&mut self, seat: SeatId) -> Option<PlayerSlot> {
        let slot = self.slots.remove(&seat)?;
        if let Some(conn) = slot.connection {
            self.connections.remove(&conn);
        }
        Some(slot)
    }

    /// Unbinds `connection` from its seat but keeps the seat.
    pub fn detach(&mut self, connection: ConnectionId) -> Option<SeatId> {
        let seat = self.connections.remove(&connection)?;
        if let Some(slot) = self.slots.get_mut(&seat) {
            slot.connection = None;
        }
        Some(seat)
    }

    /// Binds `connection` to an existing, unbound seat.
    pub fn attach(&mut self, seat: SeatId, connection: ConnectionId) -> Result<(), RoomError> {
        let slot = self
            .slots
            .get_mut(&seat)
            .ok_or_else(|| RoomError::InvalidState(format!("seat {seat} is gone")))?;
        if slot.connection.is_some() {
            return Err(RoomError::InvalidState(format!("seat {seat} is occupied")));
        }
        slot.connection = Some(connection);
        self.connections.insert(connection, seat);
        Ok(())
    }

    pub fn seat_of(&self, connection: ConnectionId) -> Option<SeatId> {
        self.connections.get(&connection).copied()
    }

    pub fn slot(&self, seat: SeatId) -> Option<&PlayerSlot> {
        self.slots.get(&seat)
    }

    pub fn slot_mut(&mut self, seat: SeatId) -> Option<&mut PlayerSlot> {
        self.slots.get_mut(&seat)
    }

    pub fn slot_for(&self, connection: ConnectionId) -> Option<&PlayerSlot> {
        self.seat_of(connection).and_then(|seat| self.slots.get(&seat))
    }

    pub fn slot_for_mut(&mut self, connection: ConnectionId) -> Option<&mut PlayerSlot> {
        let seat = self.seat_of(connection)?;
        self.slots.get_mut(&seat)
    }

    /// Seats in join order.
    pub fn slots(&self) -> impl Iterator<Item = &PlayerSlot> {
        self.slots.values()
    }

    /// Every bound connection, in seat order.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.slots.values().filter_map(|s| s.connection).collect()
    }

    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }

    pub fn live_seats(&self) -> Vec<SeatId> {
        self.slots
            .values()
            .filter(|s| s.is_live())
            .map(|s| s.seat)
            .collect()
    }

    pub fn ghost_seats(&self) -> Vec<SeatId> {
        self.slots
            .values()
            .filter(|s| s.is_ghost())
            .map(|s| s.seat)
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.slots.values().filter(|s| s.is_live()).count()
    }

    // -- lobby ------------------------------------------------------------

    pub fn selected_count(&self) -> usize {
        self.slots.values().filter(|s| s.hero_id.is_some()).count()
    }

    pub fn ready_count(&self) -> usize {
        self.slots.values().filter(|s| s.ready).count()
    }

    /// Every seat filled, every hero picked, everyone ready.
    pub fn lobby_complete(&self) -> bool {
        self.slots.len() == self.capacity
            && self
                .slots
                .values()
                .all(|s| s.hero_id.is_some() && s.ready)
    }

    // -- rounds -----------------------------------------------------------

    pub fn find_match(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn find_match_mut(&mut self, id: MatchId) -> Option<&mut Match> {
        self.matches.iter_mut().find(|m| m.id == id)
    }

    /// The uncompleted match `seat` plays in this round.
    pub fn open_match_for(&self, seat: SeatId) -> Option<&Match> {
        self.matches
            .iter()
            .find(|m| !m.completed && m.involves(seat))
    }

    pub fn all_matches_completed(&self) -> bool {
        self.matches.iter().all(|m| m.completed)
    }

    /// Turns every live seat at 0 HP into a ghost. Returns the seats.
    pub fn eliminate_depleted(&mut self) -> Vec<SeatId> {
        let round = self.current_round;
        let mut eliminated = Vec::new();
        for slot in self.slots.values_mut() {
            if slot.is_live() && slot.hp.is_depleted() {
                slot.standing = Standing::Ghost {
                    eliminated_in_round: round,
                };
                eliminated.push(slot.seat);
            }
        }
        eliminated
    }

    // -- phase ------------------------------------------------------------

    /// Moves to `target`, refusing illegal transitions.
    pub fn transition(&mut self, target: Phase) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(target) {
            return Err(RoomError::InvalidState(format!(
                "room {} cannot go from {} to {}",
                self.id, self.phase, target
            )));
        }
        info!(room_id = %self.id, from = %self.phase, to = %target, "room phase changed");
        self.phase = target;
        Ok(())
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id,
            mode: self.mode,
            phase: self.phase,
            round: self.current_round,
            players: self.slots.values().map(PlayerSlot::snapshot).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn duo_lobby() -> Room {
        Room::new(RoomId(1), RoomMode::Duo, Phase::Lobby, 2)
    }

    fn seat(room: &mut Room, id: u64) -> SeatId {
        room.join(conn(id), format!("p{id}"), 50, 0).unwrap()
    }

    #[test]
    fn test_join_assigns_seats_in_order() {
        let mut room = duo_lobby();
        assert_eq!(seat(&mut room, 10), SeatId(1));
        assert_eq!(seat(&mut room, 11), SeatId(2));
        assert_eq!(room.seat_of(conn(11)), Some(SeatId(2)));
    }

    #[test]
    fn test_join_full_room_returns_room_full() {
        let mut room = duo_lobby();
        seat(&mut room, 1);
        seat(&mut room, 2);
        let err = room.join(conn(3), "late".into(), 50, 0).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull(_)));
        assert_eq!(room.occupancy(), 2);
    }

    #[test]
    fn test_join_running_room_returns_invalid_state() {
        let mut room = Room::new(RoomId(1), RoomMode::Duo, Phase::Buffer, 2);
        let err = room.join(conn(1), "x".into(), 50, 0).unwrap_err();
        assert!(matches!(err, RoomError::InvalidState(_)));
    }

    #[test]
    fn test_seats_are_not_reused_after_leave() {
        let mut room = duo_lobby();
        let first = seat(&mut room, 1);
        room.remove(first);
        assert_eq!(seat(&mut room, 2), SeatId(2));
    }

    #[test]
    fn test_detach_keeps_seat_and_attach_rebinds() {
        let mut room = duo_lobby();
        let s = seat(&mut room, 1);

        assert_eq!(room.detach(conn(1)), Some(s));
        assert_eq!(room.occupancy(), 1);
        assert_eq!(room.connected_count(), 0);
        assert!(!room.slot(s).unwrap().is_connected());

        room.attach(s, conn(9)).unwrap();
        assert_eq!(room.seat_of(conn(9)), Some(s));
        assert!(room.attach(s, conn(10)).is_err(), "seat already bound");
    }

    #[test]
    fn test_lobby_complete_requires_every_seat_ready_with_hero() {
        let mut room = duo_lobby();
        let a = seat(&mut room, 1);
        assert!(!room.lobby_complete(), "one seat is not enough");

        let b = seat(&mut room, 2);
        for s in [a, b] {
            room.slot_mut(s).unwrap().hero_id = Some("mage".into());
        }
        room.slot_mut(a).unwrap().ready = true;
        assert!(!room.lobby_complete());

        room.slot_mut(b).unwrap().ready = true;
        assert!(room.lobby_complete());
    }

    #[test]
    fn test_eliminate_depleted_turns_zero_hp_into_ghost() {
        let mut room = duo_lobby();
        let a = seat(&mut room, 1);
        let b = seat(&mut room, 2);
        room.current_round = 3;
        room.slot_mut(b).unwrap().hp.lose(50);

        assert_eq!(room.eliminate_depleted(), vec![b]);
        assert_eq!(
            room.slot(b).unwrap().standing,
            Standing::Ghost {
                eliminated_in_round: 3
            }
        );
        assert_eq!(room.live_seats(), vec![a]);
        assert_eq!(room.ghost_seats(), vec![b]);
        assert!(room.eliminate_depleted().is_empty());
    }

    #[test]
    fn test_transition_rejects_backwards_move() {
        let mut room = duo_lobby();
        room.transition(Phase::Buffer).unwrap();
        assert!(room.transition(Phase::Lobby).is_err());
        assert_eq!(room.phase, Phase::Buffer);
    }

    #[test]
    fn test_match_opponent_of() {
        let m = Match::new(MatchId(1), SeatId(1), SeatId(4), None);
        assert_eq!(m.opponent_of(SeatId(1)), Some(SeatId(4)));
        assert_eq!(m.opponent_of(SeatId(4)), Some(SeatId(1)));
        assert_eq!(m.opponent_of(SeatId(2)), None);
    }

    #[test]
    fn test_snapshot_reports_ghost_and_connection() {
        let mut room = duo_lobby();
        let a = seat(&mut room, 1);
        room.slot_mut(a).unwrap().standing = Standing::Ghost {
            eliminated_in_round: 1,
        };
        room.detach(conn(1));

        let snap = room.snapshot();
        assert_eq!(snap.players.len(), 1);
        assert!(snap.players[0].is_ghost);
        assert!(snap.players[0].eliminated);
        assert!(!snap.players[0].connected);
    }
}
