#![cfg(feature = "test-utils")]

mod support;

use playhead::progress::ProgressSync;
use playhead::Clock;
use playhead::test_support::{ManualClock, MockProgressBackend};
use std::sync::Arc;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_secs(15);

fn sync(
    backend: Arc<MockProgressBackend>,
    clock: Arc<ManualClock>,
) -> ProgressSync {
    ProgressSync::new("lesson-1", backend, clock, DEBOUNCE, 0.9)
}

#[tokio::test]
async fn rapid_schedules_collapse_into_one_write() {
    support::tracing_init();
    let backend = Arc::new(MockProgressBackend::new());
    let clock = Arc::new(ManualClock::new());
    let mut sync = sync(backend.clone(), clock.clone());

    sync.schedule(10.0, 600.0);
    let deadline = sync.next_deadline().unwrap();
    assert_eq!(deadline, clock.now() + DEBOUNCE);

    for position in [11.0, 12.0, 13.0] {
        clock.advance(Duration::from_secs(1));
        sync.schedule(position, 600.0);
    }
    // The window is not extended by later updates
    assert_eq!(sync.next_deadline(), Some(deadline));

    // Not due yet
    sync.run_due().await;
    assert!(backend.puts().is_empty());

    clock.advance(DEBOUNCE);
    sync.run_due().await;
    let puts = backend.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].position_seconds, 13.0);
    assert!(sync.next_deadline().is_none());
}

#[tokio::test]
async fn flush_supersedes_a_pending_debounce() {
    support::tracing_init();
    let backend = Arc::new(MockProgressBackend::new());
    let clock = Arc::new(ManualClock::new());
    let mut sync = sync(backend.clone(), clock.clone());

    sync.schedule(100.0, 600.0);
    sync.flush(250.0, 600.0).await;

    assert_eq!(backend.puts().len(), 1);
    assert_eq!(backend.puts()[0].position_seconds, 250.0);
    assert!(sync.next_deadline().is_none());

    // The superseded write never fires
    clock.advance(DEBOUNCE + Duration::from_secs(1));
    sync.run_due().await;
    assert_eq!(backend.puts().len(), 1);
}

#[tokio::test]
async fn identical_flushes_are_sent_once() {
    support::tracing_init();
    let backend = Arc::new(MockProgressBackend::new());
    let clock = Arc::new(ManualClock::new());
    let mut sync = sync(backend.clone(), clock.clone());

    sync.flush(250.0, 600.0).await;
    sync.flush(250.0, 600.0).await;
    assert_eq!(backend.puts().len(), 1);

    // A different position goes through
    sync.flush(260.0, 600.0).await;
    assert_eq!(backend.puts().len(), 2);
}

#[tokio::test]
async fn beacon_flush_uses_the_beacon_transport() {
    support::tracing_init();
    let backend = Arc::new(MockProgressBackend::new());
    let clock = Arc::new(ManualClock::new());
    let mut sync = sync(backend.clone(), clock.clone());

    sync.flush_beacon(250.0, 600.0).await;
    assert!(backend.puts().is_empty());
    assert_eq!(backend.beacons().len(), 1);
}

#[tokio::test]
async fn failed_writes_are_swallowed_and_retried_on_the_next_flush() {
    support::tracing_init();
    let backend = Arc::new(MockProgressBackend::new());
    let clock = Arc::new(ManualClock::new());
    let mut sync = sync(backend.clone(), clock.clone());

    backend.fail_writes(true);
    sync.flush(250.0, 600.0).await;
    assert!(backend.server_payload().is_none());

    // The failed payload was not remembered as sent, so the identical
    // retry goes out once the backend recovers
    backend.fail_writes(false);
    sync.flush(250.0, 600.0).await;
    assert_eq!(backend.server_payload().unwrap().position_seconds, 250.0);
}

#[tokio::test]
async fn completion_is_computed_at_write_time_and_latches() {
    support::tracing_init();
    let backend = Arc::new(MockProgressBackend::new());
    let clock = Arc::new(ManualClock::new());
    let mut sync = sync(backend.clone(), clock.clone());

    sync.flush(500.0, 600.0).await;
    assert!(!backend.puts()[0].completed);
    assert!(!sync.completed());

    sync.flush(540.0, 600.0).await;
    assert!(backend.puts()[1].completed);
    assert!(sync.completed());

    // Rewinding below the threshold still reports completed
    sync.flush(100.0, 600.0).await;
    assert!(backend.puts()[2].completed);
}
