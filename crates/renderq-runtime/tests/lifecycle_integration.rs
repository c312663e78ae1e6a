//! Lifecycle Integration Tests
//!
//! Coverage of startup/shutdown behaviour: graceful draining of submitted
//! work, rejection of submissions after shutdown, cancellation of handles
//! whose commands never ran, and stats accounting across the whole run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use renderq_core::{AsyncOpError, QueueError};
use renderq_runtime::{start_test_core, CoreThreadBuilder};

#[test]
fn submitted_work_survives_immediate_shutdown() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();
    let executed = Arc::new(AtomicUsize::new(0));

    for _ in 0..500 {
        let executed = executed.clone();
        accessor.queue_command(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }
    accessor.submit().expect("submit failed");
    // Shutdown races the drain; everything submitted must still execute
    core.shutdown().expect("shutdown failed");

    assert_eq!(executed.load(Ordering::SeqCst), 500);
}

#[test]
fn handles_cancel_when_core_stops_first() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();
    core.shutdown().expect("shutdown failed");

    let op = accessor.queue_return_command(|completer| completer.complete(1i32));
    assert_eq!(accessor.submit(), Err(QueueError::CoreThreadStopped));

    // The handle resolves as cancelled rather than hanging its waiters
    assert!(op.is_cancelled());
    assert_eq!(op.wait(), Err(AsyncOpError::Cancelled));
    assert_eq!(op.value::<i32>(), Err(AsyncOpError::Cancelled));
}

#[test]
fn blocking_submit_fails_cleanly_after_shutdown() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();
    core.shutdown().expect("shutdown failed");

    accessor.queue_command(|| {});
    assert_eq!(
        accessor.submit_and_wait(),
        Err(QueueError::CoreThreadStopped)
    );
}

#[test]
fn stats_account_for_every_command() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();

    // 10 executed
    for _ in 0..10 {
        accessor.queue_command(|| {});
    }
    accessor.submit_and_wait().expect("blocking submit failed");

    // 3 cancelled locally
    for _ in 0..3 {
        accessor.queue_command(|| {});
    }
    accessor.cancel_all();

    let stats = core.stats();
    // The fence rides the batch; it is not a command of its own
    assert_eq!(stats.commands_submitted, 10);
    core.shutdown().expect("shutdown failed");

    let stats = core.stats();
    assert_eq!(stats.commands_executed, stats.commands_submitted);
    assert_eq!(stats.commands_cancelled, 3);
    assert_eq!(stats.commands_discarded, 0);
    assert_eq!(stats.commands_pending(), 0);
    assert!(stats.batches_submitted >= 1);
    assert!(stats.frames_ticked >= 1);
}

#[test]
fn named_core_thread_round_trips_config() {
    let mut core = CoreThreadBuilder::new()
        .thread_name("renderq-core-lifecycle")
        .idle_poll_interval(std::time::Duration::from_millis(5))
        .build_and_start()
        .expect("failed to start core thread");

    let handle = core.handle();
    assert!(handle.is_running());
    core.shutdown().expect("shutdown failed");
    assert!(!handle.is_running());
}
