//! Producer-Side Command Queues
//!
//! A [`CommandQueue`] buffers one producer's commands locally and hands
//! them, in order, to the shared queue on flush. The synchronization
//! discipline for producer-side appends is selected at construction through
//! the [`SyncPolicy`] type parameter:
//!
//! - [`SingleProducer`] (default): only the creation thread may append or
//!   cancel. Appends are unsynchronized; calls from any other thread are a
//!   structural bug and panic.
//! - [`MultiProducer`]: several threads may share one queue instance;
//!   appends are serialized by a mutex.
//!
//! Only the flush hand-off into the shared queue is synchronized regardless
//! of policy, because the core thread is always a different thread.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use tracing::{debug, error, warn};

use crate::async_op::{AsyncOp, AsyncOpCompleter};
use crate::command::Command;
use crate::config::QueueConfig;
use crate::errors::QueueError;
use crate::shared::{Batch, SharedQueue};

// ----------------------------------------------------------------------------
// Sync Policies
// ----------------------------------------------------------------------------

/// Producer-side append discipline for a [`CommandQueue`]
///
/// Implementations provide the local buffer; the queue never touches it
/// except through this trait.
pub trait SyncPolicy: Send + 'static {
    fn with_capacity(capacity: usize) -> Self;

    /// Append one command to the local buffer
    fn push(&self, command: Command);

    /// Remove and return the entire local buffer, preserving order
    fn drain(&self) -> Vec<Command>;

    /// Number of locally buffered commands
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unsynchronized buffering for a queue owned by a single thread
///
/// The creation thread is recorded; any producer-side call from another
/// thread fails fast rather than silently corrupting the buffer.
pub struct SingleProducer {
    owner: ThreadId,
    buffer: RefCell<Vec<Command>>,
}

impl SingleProducer {
    fn check_affinity(&self) {
        let current = thread::current().id();
        if current != self.owner {
            error!(
                ?current,
                owner = ?self.owner,
                "single-producer queue accessed from a foreign thread"
            );
            panic!(
                "thread affinity violation: single-producer command queue owned by \
                 {:?} was accessed from {:?}",
                self.owner, current
            );
        }
    }
}

impl SyncPolicy for SingleProducer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            owner: thread::current().id(),
            buffer: RefCell::new(Vec::with_capacity(capacity)),
        }
    }

    fn push(&self, command: Command) {
        self.check_affinity();
        self.buffer.borrow_mut().push(command);
    }

    fn drain(&self) -> Vec<Command> {
        self.check_affinity();
        self.buffer.borrow_mut().drain(..).collect()
    }

    fn len(&self) -> usize {
        self.check_affinity();
        self.buffer.borrow().len()
    }
}

/// Mutex-serialized buffering for a queue shared by several producer threads
pub struct MultiProducer {
    buffer: Mutex<Vec<Command>>,
}

impl SyncPolicy for MultiProducer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    fn push(&self, command: Command) {
        self.buffer
            .lock()
            .expect("command buffer poisoned")
            .push(command);
    }

    fn drain(&self) -> Vec<Command> {
        self.buffer
            .lock()
            .expect("command buffer poisoned")
            .drain(..)
            .collect()
    }

    fn len(&self) -> usize {
        self.buffer.lock().expect("command buffer poisoned").len()
    }
}

// ----------------------------------------------------------------------------
// Command Queue
// ----------------------------------------------------------------------------

/// An ordered, per-producer buffer of deferred commands
///
/// Commands appear in the shared queue in exactly the order they were
/// appended here, for any single queue instance. Created by an accessor (or
/// directly when wiring a custom host) against the shared queue of a running
/// core thread.
pub struct CommandQueue<P: SyncPolicy = SingleProducer> {
    policy: P,
    shared: Arc<SharedQueue>,
    warn_pending_threshold: usize,
}

impl<P: SyncPolicy> CommandQueue<P> {
    pub fn new(shared: Arc<SharedQueue>, config: &QueueConfig) -> Self {
        Self {
            policy: P::with_capacity(config.local_buffer_capacity),
            shared,
            warn_pending_threshold: config.warn_pending_threshold,
        }
    }

    /// Append a fire-and-forget command
    ///
    /// Buffers only; never blocks, never executes.
    pub fn queue<F>(&self, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.shared.next_command_id();
        self.policy.push(Command::fire(id, body));
    }

    /// Append a result-bearing command and return its handle immediately
    ///
    /// The handle is live before the invocation has run; it resolves once
    /// the core thread executes the command (or the command is discarded).
    pub fn queue_return<F>(&self, body: F) -> AsyncOp
    where
        F: FnOnce(&mut AsyncOpCompleter) + Send + 'static,
    {
        let id = self.shared.next_command_id();
        let (op, completer) = AsyncOp::pair(self.shared.consumer_tag());
        self.policy.push(Command::with_result(id, body, completer));
        op
    }

    /// Number of locally buffered (not yet flushed) commands
    pub fn pending(&self) -> usize {
        self.policy.len()
    }

    /// Move the entire local buffer into the shared queue, preserving order
    ///
    /// Non-blocking; an empty buffer submits nothing. Fails only after the
    /// core thread has shut down, in which case the drained commands are
    /// discarded and their handles cancelled.
    pub fn flush(&self) -> Result<(), QueueError> {
        match self.drain_for_flush() {
            Some(commands) => self.shared.submit(Batch::new(commands, None)),
            None => Ok(()),
        }
    }

    /// As [`flush`](Self::flush), then suspend the calling thread until the
    /// core thread has executed every command that was part of this flush
    ///
    /// Commands flushed afterward, or concurrently by other producers, are
    /// not waited on.
    pub fn flush_and_wait(&self) -> Result<(), QueueError> {
        let Some(commands) = self.drain_for_flush() else {
            return Ok(());
        };
        let (fence_op, fence) = AsyncOp::pair(self.shared.consumer_tag());
        self.shared.submit(Batch::new(commands, Some(fence)))?;
        // A cancelled fence means the core thread went away mid-drain
        fence_op
            .wait()
            .map_err(|_| QueueError::CoreThreadStopped)
    }

    /// Discard every command not yet moved into the shared queue
    ///
    /// Best-effort by contract: a command already handed to the shared
    /// queue — whether pending or executing — is *not* cancelled. Result
    /// handles of discarded commands resolve as cancelled.
    pub fn cancel_all(&self) {
        let commands = self.policy.drain();
        if commands.is_empty() {
            return;
        }
        self.shared.stats().record_cancelled(commands.len());
        debug!(count = commands.len(), "cancelled locally buffered commands");
    }

    fn drain_for_flush(&self) -> Option<Vec<Command>> {
        let commands = self.policy.drain();
        if commands.is_empty() {
            return None;
        }
        if commands.len() >= self.warn_pending_threshold {
            warn!(
                count = commands.len(),
                threshold = self.warn_pending_threshold,
                "flushing an unusually large command batch"
            );
        }
        Some(commands)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AsyncOpError;
    use proptest::prelude::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn test_queue<P: SyncPolicy>() -> (Arc<SharedQueue>, CommandQueue<P>) {
        let shared = Arc::new(SharedQueue::new());
        let queue = CommandQueue::<P>::new(shared.clone(), &QueueConfig::default());
        (shared, queue)
    }

    fn drain_and_execute(shared: &SharedQueue) {
        shared.bind_consumer();
        while let Some(batch) = shared.next_batch(Duration::from_millis(1)) {
            shared.execute_batch(batch);
        }
    }

    #[test]
    fn test_flush_preserves_order() {
        let (shared, queue) = test_queue::<SingleProducer>();
        let log = Arc::new(StdMutex::new(Vec::new()));

        for i in 0..5u32 {
            let log = log.clone();
            queue.queue(move || log.lock().unwrap().push(i));
        }
        assert_eq!(queue.pending(), 5);
        queue.flush().unwrap();
        assert_eq!(queue.pending(), 0);

        drain_and_execute(&shared);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_order_across_multiple_flushes() {
        let (shared, queue) = test_queue::<SingleProducer>();
        let log = Arc::new(StdMutex::new(Vec::new()));

        for chunk in 0..3u32 {
            for i in 0..4u32 {
                let log = log.clone();
                let value = chunk * 4 + i;
                queue.queue(move || log.lock().unwrap().push(value));
            }
            queue.flush().unwrap();
        }

        drain_and_execute(&shared);
        assert_eq!(*log.lock().unwrap(), (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_queue_return_handle_live_before_execution() {
        let (shared, queue) = test_queue::<SingleProducer>();

        let op = queue.queue_return(|completer| completer.complete(42i32));
        assert!(!op.has_completed());
        assert_eq!(op.value::<i32>(), Err(AsyncOpError::NotReady));

        queue.flush().unwrap();
        drain_and_execute(&shared);

        assert!(op.has_completed());
        assert_eq!(op.value::<i32>(), Ok(42));
    }

    #[test]
    fn test_cancel_all_before_flush() {
        let (shared, queue) = test_queue::<SingleProducer>();
        let log = Arc::new(StdMutex::new(Vec::<u32>::new()));

        for i in 0..5u32 {
            let log = log.clone();
            queue.queue(move || log.lock().unwrap().push(i));
        }
        let op = queue.queue_return(|c| c.complete(1i32));

        queue.cancel_all();
        assert_eq!(queue.pending(), 0);
        assert!(op.is_cancelled());
        assert_eq!(op.wait(), Err(AsyncOpError::Cancelled));

        drain_and_execute(&shared);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(shared.stats().snapshot().commands_executed, 0);
        assert_eq!(shared.stats().snapshot().commands_cancelled, 6);
    }

    #[test]
    fn test_cancel_all_does_not_touch_flushed() {
        let (shared, queue) = test_queue::<SingleProducer>();
        let log = Arc::new(StdMutex::new(Vec::new()));

        {
            let log = log.clone();
            queue.queue(move || log.lock().unwrap().push(1u32));
        }
        queue.flush().unwrap();
        queue.cancel_all();

        drain_and_execute(&shared);
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let (shared, queue) = test_queue::<SingleProducer>();
        queue.flush().unwrap();
        queue.flush_and_wait().unwrap();
        assert_eq!(shared.stats().snapshot().batches_submitted, 0);
    }

    #[test]
    fn test_flush_after_shutdown_fails_and_cancels() {
        let (shared, queue) = test_queue::<SingleProducer>();
        let op = queue.queue_return(|c| c.complete(1i32));

        shared.request_shutdown();
        assert_eq!(queue.flush(), Err(QueueError::CoreThreadStopped));
        assert!(op.is_cancelled());
    }

    #[test]
    #[should_panic(expected = "thread affinity violation")]
    fn test_single_producer_foreign_thread_panics() {
        let (_shared, queue) = test_queue::<SingleProducer>();

        let result = std::thread::spawn(move || {
            queue.queue(|| {});
        })
        .join();
        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }

    #[test]
    fn test_multi_producer_shared_appends() {
        let (shared, queue) = test_queue::<MultiProducer>();
        let queue = Arc::new(queue);

        let mut producers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            producers.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    queue.queue(|| {});
                }
            }));
        }
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(queue.pending(), 100);
        queue.flush().unwrap();
        drain_and_execute(&shared);
        assert_eq!(shared.stats().snapshot().commands_executed, 100);
    }

    proptest! {
        /// For any interleaving of queue/flush operations, execution order
        /// equals submission order.
        #[test]
        fn prop_execution_order_matches_submission(
            batch_sizes in prop::collection::vec(0usize..8, 1..12)
        ) {
            let (shared, queue) = test_queue::<SingleProducer>();
            let log = Arc::new(StdMutex::new(Vec::new()));

            let mut next = 0u32;
            for size in batch_sizes {
                for _ in 0..size {
                    let log = log.clone();
                    let value = next;
                    next += 1;
                    queue.queue(move || log.lock().unwrap().push(value));
                }
                queue.flush().unwrap();
            }

            drain_and_execute(&shared);
            prop_assert_eq!(&*log.lock().unwrap(), &(0..next).collect::<Vec<_>>());
        }
    }
}
