//! Integration tests for the Tokio-backed room scheduler.
//!
//! Every test runs with paused time, so sleeps resolve as soon as the
//! runtime has nothing else to do.

use std::time::Duration;

use gauntlet_protocol::RoomId;
use gauntlet_tick::{Scheduler, TimerKind, TokioScheduler};

#[tokio::test(start_paused = true)]
async fn test_schedule_delivers_firing_after_delay() {
    let (mut sched, mut rx) = TokioScheduler::new();
    let start = tokio::time::Instant::now();

    let handle = sched.schedule(RoomId(7), TimerKind::Countdown, Duration::from_secs(10));
    let fired = rx.recv().await.expect("timer should fire");

    assert_eq!(fired.room, RoomId(7));
    assert_eq!(fired.handle, handle);
    assert_eq!(fired.kind, TimerKind::Countdown);
    assert!(start.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_prevents_delivery() {
    let (mut sched, mut rx) = TokioScheduler::new();

    let handle = sched.schedule(RoomId(1), TimerKind::RoundTick, Duration::from_secs(1));
    sched.cancel(handle);

    let result = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    assert!(result.is_err(), "cancelled timer must not fire");
}

#[tokio::test(start_paused = true)]
async fn test_firings_arrive_in_deadline_order() {
    let (mut sched, mut rx) = TokioScheduler::new();

    sched.schedule(RoomId(1), TimerKind::RoundTick, Duration::from_secs(3));
    sched.schedule(RoomId(2), TimerKind::BufferTick, Duration::from_secs(1));

    assert_eq!(rx.recv().await.unwrap().room, RoomId(2));
    assert_eq!(rx.recv().await.unwrap().room, RoomId(1));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unknown_handle_is_noop() {
    let (mut sched, mut rx) = TokioScheduler::new();
    let handle = sched.schedule(RoomId(1), TimerKind::BufferTick, Duration::from_secs(1));
    let fired = rx.recv().await.unwrap();
    assert_eq!(fired.handle, handle);

    // Already fired: cancelling again must not panic.
    sched.cancel(handle);
    assert_eq!(sched.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_counts_unfired_timers() {
    let (mut sched, _rx) = TokioScheduler::new();
    sched.schedule(RoomId(1), TimerKind::BufferTick, Duration::from_secs(1));
    let second = sched.schedule(RoomId(2), TimerKind::BufferTick, Duration::from_secs(1));
    assert_eq!(sched.pending(), 2);

    sched.cancel(second);
    assert_eq!(sched.pending(), 1);
}
