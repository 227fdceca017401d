//! Room registry: creates, tracks, and routes connections to rooms.

use std::collections::{BTreeMap, HashMap};

use gauntlet_protocol::{MatchId, Phase, RoomId, RoomMode, SeatId};
use gauntlet_transport::ConnectionId;

use crate::{Room, RoomError, TournamentConfig};

/// Every live room, plus the connection → room index.
///
/// A connection is in at most one room at a time.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: BTreeMap<RoomId, Room>,
    by_connection: HashMap<ConnectionId, RoomId>,
    next_room: u64,
    next_match: u64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty room and returns its id.
    pub fn create_room(&mut self, mode: RoomMode, config: &TournamentConfig) -> RoomId {
        self.next_room += 1;
        let room_id = RoomId(self.next_room);
        let phase = match mode {
            RoomMode::Duo => Phase::Lobby,
            RoomMode::Bracket => Phase::Waiting,
        };
        self.rooms
            .insert(room_id, Room::new(room_id, mode, phase, config.capacity(mode)));
        tracing::info!(%room_id, %mode, "room created");
        room_id
    }

    /// Seats `connection` in `room_id` and records the binding.
    pub fn join(
        &mut self,
        room_id: RoomId,
        connection: ConnectionId,
        name: String,
        config: &TournamentConfig,
    ) -> Result<SeatId, RoomError> {
        if let Some(current) = self.by_connection.get(&connection) {
            return Err(RoomError::AlreadyInRoom(connection, *current));
        }
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        let seat = room.join(connection, name, config.starting_hp, config.starting_gold)?;
        self.by_connection.insert(connection, room_id);
        tracing::info!(%room_id, %connection, %seat, "player seated");
        Ok(seat)
    }

    /// Removes a room and drops every binding into it.
    pub fn remove(&mut self, room_id: RoomId) -> Option<Room> {
        let room = self.rooms.remove(&room_id)?;
        self.by_connection.retain(|_, r| *r != room_id);
        tracing::info!(%room_id, "room removed");
        Some(room)
    }

    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn get_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    pub fn room_of(&self, connection: ConnectionId) -> Option<RoomId> {
        self.by_connection.get(&connection).copied()
    }

    pub fn bind(&mut self, connection: ConnectionId, room_id: RoomId) {
        self.by_connection.insert(connection, room_id);
    }

    pub fn unbind(&mut self, connection: ConnectionId) -> Option<RoomId> {
        self.by_connection.remove(&connection)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// The oldest bracket room still filling up.
    pub fn first_waiting_bracket(&self) -> Option<RoomId> {
        self.rooms
            .values()
            .find(|r| r.mode == RoomMode::Bracket && r.phase == Phase::Waiting && !r.is_full())
            .map(|r| r.id)
    }

    /// The oldest duo lobby left with a single occupant.
    pub fn duo_awaiting_partner(&self) -> Option<RoomId> {
        self.rooms
            .values()
            .find(|r| r.mode == RoomMode::Duo && r.phase == Phase::Lobby && r.occupancy() == 1)
            .map(|r| r.id)
    }

    /// Allocates a process-unique match id.
    pub fn next_match_id(&mut self) -> MatchId {
        self.next_match += 1;
        MatchId(self.next_match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_create_room_sets_initial_phase_by_mode() {
        let config = TournamentConfig::default();
        let mut registry = RoomRegistry::new();
        let duo = registry.create_room(RoomMode::Duo, &config);
        let bracket = registry.create_room(RoomMode::Bracket, &config);

        assert_ne!(duo, bracket);
        assert_eq!(registry.get(duo).unwrap().phase, Phase::Lobby);
        assert_eq!(registry.get(duo).unwrap().capacity, 2);
        assert_eq!(registry.get(bracket).unwrap().phase, Phase::Waiting);
        assert_eq!(registry.get(bracket).unwrap().capacity, 8);
    }

    #[test]
    fn test_join_twice_returns_already_in_room() {
        let config = TournamentConfig::default();
        let mut registry = RoomRegistry::new();
        let a = registry.create_room(RoomMode::Bracket, &config);
        let b = registry.create_room(RoomMode::Bracket, &config);

        registry.join(a, conn(1), "p".into(), &config).unwrap();
        let err = registry.join(b, conn(1), "p".into(), &config).unwrap_err();
        assert!(matches!(err, RoomError::AlreadyInRoom(_, r) if r == a));
        assert_eq!(registry.get(b).unwrap().occupancy(), 0);
    }

    #[test]
    fn test_remove_drops_bindings() {
        let config = TournamentConfig::default();
        let mut registry = RoomRegistry::new();
        let room = registry.create_room(RoomMode::Duo, &config);
        registry.join(room, conn(1), "p".into(), &config).unwrap();

        assert!(registry.remove(room).is_some());
        assert_eq!(registry.room_of(conn(1)), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_first_waiting_bracket_skips_full_rooms() {
        let config = TournamentConfig {
            bracket_capacity: 1,
            ..TournamentConfig::default()
        };
        let mut registry = RoomRegistry::new();
        let full = registry.create_room(RoomMode::Bracket, &config);
        registry.join(full, conn(1), "p".into(), &config).unwrap();
        assert_eq!(registry.first_waiting_bracket(), None);

        let open = registry.create_room(RoomMode::Bracket, &config);
        assert_eq!(registry.first_waiting_bracket(), Some(open));
    }

    #[test]
    fn test_duo_awaiting_partner_needs_exactly_one_occupant() {
        let config = TournamentConfig::default();
        let mut registry = RoomRegistry::new();
        let room = registry.create_room(RoomMode::Duo, &config);
        assert_eq!(registry.duo_awaiting_partner(), None);

        registry.join(room, conn(1), "a".into(), &config).unwrap();
        assert_eq!(registry.duo_awaiting_partner(), Some(room));

        registry.join(room, conn(2), "b".into(), &config).unwrap();
        assert_eq!(registry.duo_awaiting_partner(), None);
    }

    #[test]
    fn test_next_match_id_is_monotonic() {
        let mut registry = RoomRegistry::new();
        let first = registry.next_match_id();
        let second = registry.next_match_id();
        assert!(second > first);
    }
}
