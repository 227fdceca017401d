//! Placing connections into duo and bracket rooms.

use std::collections::VecDeque;

use gauntlet_protocol::{RoomId, RoomMode, SeatId};
use gauntlet_transport::ConnectionId;

use crate::{RoomError, RoomRegistry, TournamentConfig};

#[derive(Debug, Clone)]
struct QueueEntry {
    connection: ConnectionId,
    name: String,
}

/// Where a duo request ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuoPlacement {
    /// Took the empty seat of a duo lobby someone else left.
    Backfilled { room_id: RoomId, seat: SeatId },
    /// Waiting in the queue. `position` is 1-based.
    Queued { position: usize, waiting: usize },
    /// Paired with the oldest queued connection in a fresh room.
    /// Seats are in join order.
    Paired {
        room_id: RoomId,
        seats: [(ConnectionId, SeatId); 2],
    },
}

/// Where a bracket request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketPlacement {
    pub room_id: RoomId,
    pub seat: SeatId,
    pub occupancy: usize,
    /// The join filled the room; its countdown should start.
    pub full: bool,
}

/// Seats a popped queue pair in a fresh duo room, in queue order.
fn seat_pair(
    registry: &mut RoomRegistry,
    room_id: RoomId,
    first: &QueueEntry,
    second: &QueueEntry,
    config: &TournamentConfig,
) -> Result<[(ConnectionId, SeatId); 2], RoomError> {
    let seat1 = registry.join(room_id, first.connection, first.name.clone(), config)?;
    let seat2 = registry.join(room_id, second.connection, second.name.clone(), config)?;
    Ok([(first.connection, seat1), (second.connection, seat2)])
}

/// The duo queue and the placement rules for both modes.
#[derive(Debug, Default)]
pub struct Matchmaker {
    duo_queue: VecDeque<QueueEntry>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles `requestMatch`.
    ///
    /// `is_connected` filters out queue entries whose connection has gone
    /// away without telling us.
    pub fn request_duo(
        &mut self,
        registry: &mut RoomRegistry,
        connection: ConnectionId,
        name: String,
        config: &TournamentConfig,
        is_connected: impl Fn(ConnectionId) -> bool,
    ) -> Result<DuoPlacement, RoomError> {
        if let Some(room_id) = registry.room_of(connection) {
            return Err(RoomError::AlreadyInRoom(connection, room_id));
        }
        if let Some(position) = self.position(connection) {
            return Ok(DuoPlacement::Queued {
                position,
                waiting: self.duo_queue.len(),
            });
        }

        if let Some(room_id) = registry.duo_awaiting_partner() {
            let seat = registry.join(room_id, connection, name, config)?;
            return Ok(DuoPlacement::Backfilled { room_id, seat });
        }

        self.duo_queue.push_back(QueueEntry { connection, name });
        self.duo_queue
            .retain(|e| is_connected(e.connection) && registry.room_of(e.connection).is_none());

        if self.duo_queue.len() >= 2 {
            if let (Some(first), Some(second)) =
                (self.duo_queue.pop_front(), self.duo_queue.pop_front())
            {
                let room_id = registry.create_room(RoomMode::Duo, config);
                return match seat_pair(registry, room_id, &first, &second, config) {
                    Ok(seats) => {
                        tracing::info!(%room_id, "duo pair formed from queue");
                        Ok(DuoPlacement::Paired { room_id, seats })
                    }
                    Err(e) => {
                        registry.remove(room_id);
                        for entry in [second, first] {
                            if registry.room_of(entry.connection).is_none() {
                                self.duo_queue.push_front(entry);
                            }
                        }
                        Err(e)
                    }
                };
            }
        }

        let position = self.position(connection).unwrap_or(self.duo_queue.len());
        tracing::debug!(%connection, position, "queued for duo");
        Ok(DuoPlacement::Queued {
            position,
            waiting: self.duo_queue.len(),
        })
    }

    /// Handles `requestTournament`: the first bracket room still waiting,
    /// or a new one.
    pub fn request_bracket(
        &mut self,
        registry: &mut RoomRegistry,
        connection: ConnectionId,
        name: String,
        config: &TournamentConfig,
    ) -> Result<BracketPlacement, RoomError> {
        if let Some(room_id) = registry.room_of(connection) {
            return Err(RoomError::AlreadyInRoom(connection, room_id));
        }
        self.remove(connection);

        let room_id = match registry.first_waiting_bracket() {
            Some(id) => id,
            None => registry.create_room(RoomMode::Bracket, config),
        };
        let seat = registry.join(room_id, connection, name, config)?;
        let room = registry.get(room_id).ok_or(RoomError::NotFound(room_id))?;
        Ok(BracketPlacement {
            room_id,
            seat,
            occupancy: room.occupancy(),
            full: room.is_full(),
        })
    }

    /// Drops `connection` from the duo queue. Returns `true` if it was there.
    pub fn remove(&mut self, connection: ConnectionId) -> bool {
        let before = self.duo_queue.len();
        self.duo_queue.retain(|e| e.connection != connection);
        self.duo_queue.len() != before
    }

    /// 1-based queue position.
    pub fn position(&self, connection: ConnectionId) -> Option<usize> {
        self.duo_queue
            .iter()
            .position(|e| e.connection == connection)
            .map(|i| i + 1)
    }

    pub fn queue_len(&self) -> usize {
        self.duo_queue.len()
    }
}
