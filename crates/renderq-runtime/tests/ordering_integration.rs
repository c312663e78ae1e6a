//! Ordering Integration Tests
//!
//! End-to-end coverage of the per-producer ordering guarantees: commands
//! from one accessor execute in submission order, concurrent producers each
//! keep their own subsequence ordered, and result handles resolve with the
//! values their commands produced.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use renderq_core::AsyncOpError;
use renderq_runtime::start_test_core;

// ----------------------------------------------------------------------------
// Single-Producer Ordering
// ----------------------------------------------------------------------------

#[test]
fn commands_execute_in_submission_order() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in ["a", "b", "c"] {
        let log = log.clone();
        accessor.queue_command(move || log.lock().unwrap().push(name));
    }
    accessor.submit().expect("submit failed");
    // Local buffer is empty immediately after the call
    assert_eq!(accessor.pending(), 0);

    // A fenced follow-up flush orders after the previous flush of this queue
    accessor.queue_command(|| {});
    accessor.submit_and_wait().expect("blocking submit failed");

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    core.shutdown().expect("shutdown failed");
}

#[test]
fn order_holds_across_many_flushes() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut expected = Vec::new();
    for flush in 0..20u32 {
        for i in 0..5u32 {
            let value = flush * 5 + i;
            expected.push(value);
            let log = log.clone();
            accessor.queue_command(move || log.lock().unwrap().push(value));
        }
        accessor.submit().expect("submit failed");
    }
    accessor.queue_command(|| {});
    accessor.submit_and_wait().expect("blocking submit failed");

    assert_eq!(*log.lock().unwrap(), expected);
    core.shutdown().expect("shutdown failed");
}

// ----------------------------------------------------------------------------
// Result Handles
// ----------------------------------------------------------------------------

#[test]
fn return_command_resolves_with_value() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();

    let op = accessor.queue_return_command(|completer| completer.complete(42i32));
    assert!(!op.has_completed());

    accessor.submit_and_wait().expect("blocking submit failed");

    assert!(op.has_completed());
    assert_eq!(op.value::<i32>(), Ok(42));
    core.shutdown().expect("shutdown failed");
}

#[test]
fn value_before_completion_is_not_ready() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();

    let op = accessor.queue_return_command(|completer| completer.complete(7u8));
    // Not flushed yet, so it cannot possibly have run
    assert_eq!(op.value::<u8>(), Err(AsyncOpError::NotReady));

    accessor.submit_and_wait().expect("blocking submit failed");
    assert_eq!(op.value::<u8>(), Ok(7));
    core.shutdown().expect("shutdown failed");
}

#[test]
fn handle_usable_as_future() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();

    let op = accessor.queue_return_command(|completer| completer.complete(String::from("frame")));
    accessor.submit().expect("submit failed");

    futures::executor::block_on(op.clone()).expect("op cancelled");
    assert_eq!(op.value::<String>(), Ok(String::from("frame")));
    core.shutdown().expect("shutdown failed");
}

// ----------------------------------------------------------------------------
// Cancellation
// ----------------------------------------------------------------------------

#[test]
fn cancel_all_before_submit_executes_nothing() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();
    let executed = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let executed = executed.clone();
        accessor.queue_command(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }
    accessor.cancel_all();
    assert_eq!(accessor.pending(), 0);

    // Fence a later command through to prove the loop is live and empty
    accessor.queue_command(|| {});
    accessor.submit_and_wait().expect("blocking submit failed");

    assert_eq!(executed.load(Ordering::SeqCst), 0);
    core.shutdown().expect("shutdown failed");
}

#[test]
fn cancel_all_after_submit_has_no_effect_on_flushed() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().accessor();
    let executed = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let executed = executed.clone();
        accessor.queue_command(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        });
    }
    accessor.submit().expect("submit failed");
    accessor.cancel_all();

    accessor.queue_command(|| {});
    accessor.submit_and_wait().expect("blocking submit failed");

    assert_eq!(executed.load(Ordering::SeqCst), 5);
    core.shutdown().expect("shutdown failed");
}

// ----------------------------------------------------------------------------
// Concurrent Producers
// ----------------------------------------------------------------------------

#[test]
fn concurrent_producers_keep_their_own_order() {
    const PRODUCERS: usize = 2;
    const COMMANDS: usize = 100;

    let mut core = start_test_core().expect("failed to start core thread");
    let handle = core.handle();
    let trace: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));

    let mut producers = Vec::new();
    for producer in 0..PRODUCERS {
        let handle = handle.clone();
        let trace = trace.clone();
        producers.push(thread::spawn(move || {
            // Accessors bind to their creation thread
            let accessor = handle.accessor();
            for i in 0..COMMANDS {
                let trace = trace.clone();
                accessor.queue_command(move || trace.lock().unwrap().push((producer, i)));
                // Flush in uneven chunks to exercise batch interleaving
                if i % 7 == 0 {
                    accessor.submit().expect("submit failed");
                }
            }
            accessor.submit_and_wait().expect("blocking submit failed");
        }));
    }
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    let trace = trace.lock().unwrap();
    assert_eq!(trace.len(), PRODUCERS * COMMANDS);

    // Every producer's own subsequence must be 0..COMMANDS in order
    for producer in 0..PRODUCERS {
        let own: Vec<usize> = trace
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, i)| *i)
            .collect();
        assert_eq!(own, (0..COMMANDS).collect::<Vec<_>>());
    }

    core.shutdown().expect("shutdown failed");
}

#[test]
fn shared_accessor_serializes_appends() {
    let mut core = start_test_core().expect("failed to start core thread");
    let accessor = core.handle().shared_accessor();
    let executed = Arc::new(AtomicUsize::new(0));

    let mut producers = Vec::new();
    for _ in 0..4 {
        let accessor = accessor.clone();
        let executed = executed.clone();
        producers.push(thread::spawn(move || {
            for _ in 0..50 {
                let executed = executed.clone();
                accessor.queue_command(move || {
                    executed.fetch_add(1, Ordering::SeqCst);
                });
            }
        }));
    }
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    accessor.submit_and_wait().expect("blocking submit failed");
    assert_eq!(executed.load(Ordering::SeqCst), 200);
    core.shutdown().expect("shutdown failed");
}
