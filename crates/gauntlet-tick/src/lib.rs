//! Room timer scheduling for Gauntlet.
//!
//! Rooms never sleep. When a room needs time to pass (a bracket countdown,
//! a buffer second, a round second) the arena asks a [`Scheduler`] for a
//! one-shot timer and later receives a [`TimerFired`] carrying the same
//! [`TimerHandle`]. Each room holds at most one handle; a firing whose
//! handle no longer matches the room's current one is stale and ignored.
//!
//! Two implementations ship:
//!
//! - [`TokioScheduler`] spawns a sleeping task per timer and delivers
//!   firings on an mpsc channel. It sits in the arena actor's
//!   `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => arena.handle_event(cmd.conn, cmd.event, now),
//!         Some(fired) = timer_rx.recv() => arena.handle_timer(fired),
//!     }
//! }
//! ```
//!
//! - [`ManualScheduler`] keeps a virtual clock that tests advance by hand,
//!   so a 50 s round runs in microseconds.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gauntlet_protocol::RoomId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

// ---------------------------------------------------------------------------
// Timer identity
// ---------------------------------------------------------------------------

/// What a timer is for. The arena dispatches on this when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Bracket room is full; hero selection opens when this fires.
    Countdown,
    /// One second of the inter-round buffer elapsed.
    BufferTick,
    /// One second of the round elapsed.
    RoundTick,
}

/// Opaque handle for one scheduled timer. Never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

/// Delivered to the arena when a timer elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub room: RoomId,
    pub handle: TimerHandle,
    pub kind: TimerKind,
}

// ---------------------------------------------------------------------------
// Scheduler trait
// ---------------------------------------------------------------------------

/// Starts and clears one-shot room timers.
///
/// Implementations must guarantee that a cancelled handle is never
/// delivered after `cancel` returns, as far as they can observe. The arena
/// double-checks the handle on delivery regardless.
pub trait Scheduler: Send {
    /// Schedules `kind` for `room` to fire once after `delay`.
    fn schedule(&mut self, room: RoomId, kind: TimerKind, delay: Duration) -> TimerHandle;

    /// Clears a pending timer. Cancelling an unknown or already-fired
    /// handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

// ---------------------------------------------------------------------------
// TokioScheduler
// ---------------------------------------------------------------------------

/// A [`Scheduler`] backed by `tokio::time::sleep`.
///
/// Must be used from within a Tokio runtime.
pub struct TokioScheduler {
    next_handle: u64,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl TokioScheduler {
    /// Creates a scheduler and the receiver its firings arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            next_handle: 1,
            tasks: HashMap::new(),
            fired_tx,
        };
        (scheduler, fired_rx)
    }

    /// Number of timers that have not fired or been cancelled yet.
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, room: RoomId, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.tasks.retain(|_, task| !task.is_finished());

        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The arena may be gone during shutdown; nothing to do then.
            let _ = tx.send(TimerFired { room, handle, kind });
        });
        self.tasks.insert(handle, task);

        trace!(%room, ?kind, ?delay, handle = handle.0, "timer scheduled");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
            trace!(handle = handle.0, "timer cancelled");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    next_handle: u64,
    /// Keyed by (due time, handle) so equal deadlines fire in schedule order.
    pending: BTreeMap<(Duration, TimerHandle), TimerFired>,
}

/// A virtual-clock [`Scheduler`] for tests.
///
/// Clones share the same clock, so a test keeps one clone and hands the
/// other to the arena.
///
/// ```
/// use std::time::Duration;
/// use gauntlet_protocol::RoomId;
/// use gauntlet_tick::{ManualScheduler, Scheduler, TimerKind};
///
/// let clock = ManualScheduler::new();
/// let mut sched = clock.clone();
/// sched.schedule(RoomId(1), TimerKind::Countdown, Duration::from_secs(10));
///
/// assert!(clock.pop_due(Duration::from_secs(9)).is_none());
/// let fired = clock.pop_due(Duration::from_secs(10)).unwrap();
/// assert_eq!(fired.kind, TimerKind::Countdown);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    /// Creates a scheduler whose clock reads zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ManualState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Current virtual time since creation.
    pub fn now(&self) -> Duration {
        self.with_state(|s| s.now)
    }

    /// Number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.with_state(|s| s.pending.len())
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<Duration> {
        self.with_state(|s| s.pending.keys().next().map(|(due, _)| *due))
    }

    /// Removes and returns the earliest timer due at or before `until`,
    /// moving the clock to its due time.
    ///
    /// Call in a loop, handing each firing to the arena before the next
    /// pop, so timers scheduled in response are seen too.
    pub fn pop_due(&self, until: Duration) -> Option<TimerFired> {
        self.with_state(|s| {
            let key = *s.pending.keys().next()?;
            if key.0 > until {
                return None;
            }
            s.now = s.now.max(key.0);
            s.pending.remove(&key)
        })
    }

    /// Moves the clock forward to `until` without firing anything.
    pub fn set_now(&self, until: Duration) {
        self.with_state(|s| s.now = s.now.max(until));
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, room: RoomId, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.with_state(|s| {
            s.next_handle += 1;
            let handle = TimerHandle(s.next_handle);
            let due = s.now + delay;
            s.pending
                .insert((due, handle), TimerFired { room, handle, kind });
            handle
        })
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.with_state(|s| s.pending.retain(|(_, h), _| *h != handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_schedule_orders_by_due_time() {
        let clock = ManualScheduler::new();
        let mut sched = clock.clone();
        sched.schedule(RoomId(1), TimerKind::RoundTick, Duration::from_secs(5));
        sched.schedule(RoomId(2), TimerKind::BufferTick, Duration::from_secs(1));

        let first = clock.pop_due(Duration::from_secs(60)).unwrap();
        assert_eq!(first.room, RoomId(2));
        assert_eq!(clock.now(), Duration::from_secs(1));

        let second = clock.pop_due(Duration::from_secs(60)).unwrap();
        assert_eq!(second.room, RoomId(1));
        assert_eq!(clock.now(), Duration::from_secs(5));
    }

    #[test]
    fn test_manual_cancel_removes_pending_timer() {
        let clock = ManualScheduler::new();
        let mut sched = clock.clone();
        let handle = sched.schedule(RoomId(1), TimerKind::Countdown, Duration::from_secs(10));
        assert_eq!(clock.pending(), 1);

        sched.cancel(handle);
        assert_eq!(clock.pending(), 0);
        assert!(clock.pop_due(Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_manual_handles_are_never_reused() {
        let mut sched = ManualScheduler::new();
        let a = sched.schedule(RoomId(1), TimerKind::BufferTick, Duration::from_secs(1));
        sched.cancel(a);
        let b = sched.schedule(RoomId(1), TimerKind::BufferTick, Duration::from_secs(1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_manual_delay_is_relative_to_virtual_now() {
        let clock = ManualScheduler::new();
        let mut sched = clock.clone();
        clock.set_now(Duration::from_secs(30));
        sched.schedule(RoomId(1), TimerKind::RoundTick, Duration::from_secs(1));
        assert_eq!(clock.next_due(), Some(Duration::from_secs(31)));
    }
}
