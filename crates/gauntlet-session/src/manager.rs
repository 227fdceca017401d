//! The session manager: token ↔ session ↔ connection.
//!
//! Not thread-safe by itself. It is owned by the arena, which runs on a
//! single actor task, so every method takes `&mut self` and no locking is
//! involved.
//!
//! Time-dependent methods come in two flavours: `foo` reads the clock,
//! `foo_at(now, ..)` takes it as an argument. The arena always passes its
//! own `now` so a whole event is handled against one instant.

use std::collections::HashMap;
use std::time::Instant;

use gauntlet_protocol::{RoomId, SlotSnapshot};
use gauntlet_transport::ConnectionId;
use rand::Rng;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Tracks every live or reconnectable session.
///
/// Invariants: a connection maps to at most one session, and a token to
/// exactly one.
pub struct SessionManager {
    /// Keyed by token.
    sessions: HashMap<String, Session>,

    /// Active connections only. A disconnected session is reachable by
    /// token alone.
    by_connection: HashMap<ConnectionId, String>,

    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            by_connection: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // -- create -----------------------------------------------------------

    /// Issues a session for `connection`'s seat in `room_id`.
    pub fn create_session(
        &mut self,
        connection: ConnectionId,
        room_id: RoomId,
        snapshot: SlotSnapshot,
    ) -> &Session {
        self.create_session_at(Instant::now(), connection, room_id, snapshot)
    }

    /// [`create_session`](Self::create_session) at an explicit instant.
    ///
    /// Any session already bound to `connection` is destroyed first.
    pub fn create_session_at(
        &mut self,
        now: Instant,
        connection: ConnectionId,
        room_id: RoomId,
        snapshot: SlotSnapshot,
    ) -> &Session {
        if let Some(old) = self.by_connection.remove(&connection) {
            self.sessions.remove(&old);
        }

        let mut token = generate_token();
        while self.sessions.contains_key(&token) {
            token = generate_token();
        }

        tracing::info!(%connection, %room_id, seat = %snapshot.seat, "session created");

        self.by_connection.insert(connection, token.clone());
        self.sessions.entry(token.clone()).or_insert(Session {
            token,
            connection,
            room_id,
            snapshot,
            created_at: now,
            state: SessionState::Active,
        })
    }

    // -- disconnect -------------------------------------------------------

    /// Opens the reconnection window for `connection`'s session.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the connection has no session.
    pub fn mark_disconnected(&mut self, connection: ConnectionId) -> Result<&Session, SessionError> {
        self.mark_disconnected_at(Instant::now(), connection)
    }

    /// [`mark_disconnected`](Self::mark_disconnected) at an explicit instant.
    pub fn mark_disconnected_at(
        &mut self,
        now: Instant,
        connection: ConnectionId,
    ) -> Result<&Session, SessionError> {
        let token = self
            .by_connection
            .remove(&connection)
            .ok_or(SessionError::NotFound(connection))?;
        let session = self
            .sessions
            .get_mut(&token)
            .ok_or(SessionError::NotFound(connection))?;

        session.state = SessionState::Disconnected {
            since: now,
            expires_at: now + self.config.reconnect_window,
        };
        tracing::info!(
            %connection,
            room_id = %session.room_id,
            window = ?self.config.reconnect_window,
            "session disconnected, reconnection window open"
        );
        Ok(session)
    }

    // -- reconnect --------------------------------------------------------

    /// Rebinds the session behind `token` to `new_connection`.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: unknown token
    /// - [`SessionError::AlreadyActive`]: the session has a live connection
    /// - [`SessionError::Expired`]: the window lapsed; the session is evicted
    pub fn reconnect(
        &mut self,
        token: &str,
        new_connection: ConnectionId,
    ) -> Result<&Session, SessionError> {
        self.reconnect_at(Instant::now(), token, new_connection)
    }

    /// [`reconnect`](Self::reconnect) at an explicit instant.
    pub fn reconnect_at(
        &mut self,
        now: Instant,
        token: &str,
        new_connection: ConnectionId,
    ) -> Result<&Session, SessionError> {
        let session = self.sessions.get(token).ok_or(SessionError::InvalidToken)?;

        if session.is_active() {
            return Err(SessionError::AlreadyActive);
        }
        if session.is_expired_at(now) {
            tracing::info!(room_id = %session.room_id, "reconnect after window, evicting session");
            self.sessions.remove(token);
            return Err(SessionError::Expired);
        }

        if let Some(old) = self.by_connection.insert(new_connection, token.to_owned()) {
            if old != token {
                self.sessions.remove(&old);
            }
        }

        let session = self
            .sessions
            .get_mut(token)
            .ok_or(SessionError::InvalidToken)?;
        session.connection = new_connection;
        session.state = SessionState::Active;
        tracing::info!(
            connection = %new_connection,
            room_id = %session.room_id,
            seat = %session.snapshot.seat,
            "session reconnected"
        );
        Ok(session)
    }

    // -- sweep / destroy --------------------------------------------------

    /// Purges every session whose window has lapsed and returns them.
    pub fn sweep(&mut self) -> Vec<Session> {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) at an explicit instant.
    pub fn sweep_at(&mut self, now: Instant) -> Vec<Session> {
        let lapsed: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.is_expired_at(now))
            .map(|s| s.token.clone())
            .collect();

        let purged: Vec<Session> = lapsed
            .iter()
            .filter_map(|token| self.sessions.remove(token))
            .collect();
        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "swept expired sessions");
        }
        purged
    }

    /// Removes the session behind `token` immediately.
    pub fn destroy(&mut self, token: &str) -> Option<Session> {
        let session = self.sessions.remove(token)?;
        if self.by_connection.get(&session.connection).map(String::as_str) == Some(token) {
            self.by_connection.remove(&session.connection);
        }
        tracing::debug!(room_id = %session.room_id, "session destroyed");
        Some(session)
    }

    /// Removes the session bound to `connection`, if any.
    pub fn destroy_for_connection(&mut self, connection: ConnectionId) -> Option<Session> {
        let token = self.by_connection.get(&connection)?.clone();
        self.destroy(&token)
    }

    /// Removes every session pointing at `room_id`. Used on room teardown.
    pub fn destroy_for_room(&mut self, room_id: RoomId) -> Vec<Session> {
        let tokens: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.room_id == room_id)
            .map(|s| s.token.clone())
            .collect();
        tokens.iter().filter_map(|t| self.destroy(t)).collect()
    }

    // -- lookups ----------------------------------------------------------

    pub fn get(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    /// The session currently bound to `connection`.
    pub fn for_connection(&self, connection: ConnectionId) -> Option<&Session> {
        self.by_connection
            .get(&connection)
            .and_then(|t| self.sessions.get(t))
    }

    /// Number of disconnected sessions still waiting on `room_id`.
    pub fn pending_for_room(&self, room_id: RoomId) -> usize {
        self.sessions
            .values()
            .filter(|s| s.room_id == room_id && !s.is_active())
            .count()
    }

    /// Replaces the snapshot stored with `connection`'s session.
    pub fn refresh_snapshot(&mut self, connection: ConnectionId, snapshot: SlotSnapshot) {
        if let Some(token) = self.by_connection.get(&connection) {
            if let Some(session) = self.sessions.get_mut(token) {
                session.snapshot = snapshot;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 32 random bytes as 64 lowercase hex characters.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionManager`.
    //!
    //! Every time-dependent call goes through the `_at` variant with an
    //! instant derived from one base, so expiry is exact and no test
    //! sleeps.

    use std::time::Duration;

    use gauntlet_protocol::{Hp, SeatId};

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig::default())
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn snapshot(seat: u32) -> SlotSnapshot {
        SlotSnapshot {
            seat: SeatId(seat),
            name: format!("Player_{seat}"),
            hero_id: None,
            ready: false,
            hp: Hp::full(50),
            gold: 0,
            eliminated: false,
            is_ghost: false,
            wins: 0,
            losses: 0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            connected: true,
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    /// Creates a session for `conn(1)` in room 1 and returns its token.
    fn issue(mgr: &mut SessionManager, t0: Instant) -> String {
        mgr.create_session_at(t0, conn(1), RoomId(1), snapshot(1))
            .token
            .clone()
    }

    // =====================================================================
    // create_session()
    // =====================================================================

    #[test]
    fn test_create_session_returns_active_session_with_hex_token() {
        let mut mgr = manager();
        let session = mgr.create_session(conn(1), RoomId(4), snapshot(2));

        assert!(session.is_active());
        assert_eq!(session.room_id, RoomId(4));
        assert_eq!(session.snapshot.seat, SeatId(2));
        assert_eq!(session.token.len(), 64);
        assert!(session.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(session.expires_at().is_none());
    }

    #[test]
    fn test_create_session_tokens_are_unique() {
        let mut mgr = manager();
        let a = mgr.create_session(conn(1), RoomId(1), snapshot(1)).token.clone();
        let b = mgr.create_session(conn(2), RoomId(1), snapshot(2)).token.clone();
        assert_ne!(a, b);
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn test_create_session_same_connection_replaces_old_session() {
        let mut mgr = manager();
        let old = mgr.create_session(conn(1), RoomId(1), snapshot(1)).token.clone();
        let new = mgr.create_session(conn(1), RoomId(2), snapshot(1)).token.clone();

        assert_eq!(mgr.len(), 1, "one connection, one session");
        assert!(mgr.get(&old).is_none());
        assert_eq!(mgr.for_connection(conn(1)).unwrap().token, new);
    }

    // =====================================================================
    // mark_disconnected()
    // =====================================================================

    #[test]
    fn test_mark_disconnected_opens_sixty_second_window() {
        let mut mgr = manager();
        let t0 = Instant::now();
        issue(&mut mgr, t0);

        let session = mgr.mark_disconnected_at(t0 + secs(5), conn(1)).unwrap();
        assert!(!session.is_active());
        assert_eq!(session.expires_at(), Some(t0 + secs(65)));
    }

    #[test]
    fn test_mark_disconnected_unknown_connection_returns_not_found() {
        let mut mgr = manager();
        let err = mgr.mark_disconnected(conn(99)).unwrap_err();
        assert!(matches!(err, SessionError::NotFound(c) if c == conn(99)));
    }

    #[test]
    fn test_mark_disconnected_unbinds_connection() {
        let mut mgr = manager();
        let t0 = Instant::now();
        let token = issue(&mut mgr, t0);
        mgr.mark_disconnected_at(t0, conn(1)).unwrap();

        assert!(mgr.for_connection(conn(1)).is_none());
        assert!(mgr.get(&token).is_some(), "still claimable by token");
        assert_eq!(mgr.pending_for_room(RoomId(1)), 1);
    }

    // =====================================================================
    // reconnect()
    // =====================================================================

    #[test]
    fn test_reconnect_within_window_rebinds_connection() {
        let mut mgr = manager();
        let t0 = Instant::now();
        let token = issue(&mut mgr, t0);
        mgr.mark_disconnected_at(t0, conn(1)).unwrap();

        let session = mgr.reconnect_at(t0 + secs(59), &token, conn(2)).unwrap();
        assert!(session.is_active());
        assert_eq!(session.connection, conn(2));
        assert_eq!(mgr.for_connection(conn(2)).unwrap().token, token);
        assert_eq!(mgr.pending_for_room(RoomId(1)), 0);
    }

    #[test]
    fn test_reconnect_unknown_token_returns_invalid_token() {
        let mut mgr = manager();
        let err = mgr.reconnect("deadbeef", conn(2)).unwrap_err();
        assert!(matches!(err, SessionError::InvalidToken));
    }

    #[test]
    fn test_reconnect_active_session_returns_already_active() {
        let mut mgr = manager();
        let t0 = Instant::now();
        let token = issue(&mut mgr, t0);

        let err = mgr.reconnect_at(t0, &token, conn(2)).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyActive));
        assert_eq!(mgr.for_connection(conn(1)).unwrap().token, token);
    }

    #[test]
    fn test_reconnect_expired_token_fails_and_evicts() {
        let mut mgr = manager();
        let t0 = Instant::now();
        let token = issue(&mut mgr, t0);
        mgr.mark_disconnected_at(t0, conn(1)).unwrap();

        let err = mgr.reconnect_at(t0 + secs(61), &token, conn(2)).unwrap_err();
        assert!(matches!(err, SessionError::Expired));
        assert!(mgr.get(&token).is_none(), "expired token must be evicted");

        let again = mgr.reconnect_at(t0 + secs(62), &token, conn(3)).unwrap_err();
        assert!(matches!(again, SessionError::InvalidToken));
    }

    #[test]
    fn test_reconnect_at_window_boundary_still_succeeds() {
        let mut mgr = manager();
        let t0 = Instant::now();
        let token = issue(&mut mgr, t0);
        mgr.mark_disconnected_at(t0, conn(1)).unwrap();

        assert!(mgr.sweep_at(t0 + secs(60)).is_empty());
        let session = mgr.reconnect_at(t0 + secs(60), &token, conn(2)).unwrap();
        assert!(session.is_active());
    }

    // =====================================================================
    // sweep()
    // =====================================================================

    #[test]
    fn test_sweep_purges_only_lapsed_sessions() {
        let mut mgr = manager();
        let t0 = Instant::now();
        mgr.create_session_at(t0, conn(1), RoomId(1), snapshot(1));
        mgr.create_session_at(t0, conn(2), RoomId(1), snapshot(2));
        mgr.create_session_at(t0, conn(3), RoomId(1), snapshot(3));
        mgr.mark_disconnected_at(t0, conn(1)).unwrap();
        mgr.mark_disconnected_at(t0 + secs(30), conn(2)).unwrap();

        let purged = mgr.sweep_at(t0 + secs(70));
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].snapshot.seat, SeatId(1));
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn test_sweep_with_nothing_lapsed_returns_empty() {
        let mut mgr = manager();
        let t0 = Instant::now();
        issue(&mut mgr, t0);
        assert!(mgr.sweep_at(t0 + secs(3600)).is_empty(), "active sessions never lapse");
    }

    // =====================================================================
    // destroy()
    // =====================================================================

    #[test]
    fn test_destroy_removes_session_and_binding() {
        let mut mgr = manager();
        let token = issue(&mut mgr, Instant::now());

        let removed = mgr.destroy(&token).unwrap();
        assert_eq!(removed.connection, conn(1));
        assert!(mgr.is_empty());
        assert!(mgr.for_connection(conn(1)).is_none());
        assert!(mgr.destroy(&token).is_none());
    }

    #[test]
    fn test_destroy_for_room_leaves_other_rooms() {
        let mut mgr = manager();
        mgr.create_session(conn(1), RoomId(1), snapshot(1));
        mgr.create_session(conn(2), RoomId(2), snapshot(1));

        let removed = mgr.destroy_for_room(RoomId(1));
        assert_eq!(removed.len(), 1);
        assert_eq!(mgr.len(), 1);
        assert!(mgr.for_connection(conn(2)).is_some());
    }

    #[test]
    fn test_refresh_snapshot_updates_stored_copy() {
        let mut mgr = manager();
        let token = issue(&mut mgr, Instant::now());
        let mut snap = snapshot(1);
        snap.gold = 300;
        mgr.refresh_snapshot(conn(1), snap);
        assert_eq!(mgr.get(&token).unwrap().snapshot.gold, 300);
    }
}
