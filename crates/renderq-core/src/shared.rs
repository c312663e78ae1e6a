//! Consumer-Visible Shared Queue
//!
//! The [`SharedQueue`] is the one structure mutated by more than one thread:
//! producers hand flushed batches in (`submit`), and the single core thread
//! drains them FIFO (`next_batch`). A mutex-protected deque plus a condvar
//! gives the required multi-producer/single-consumer discipline at batch
//! granularity — commands from one producer queue stay contiguous and
//! ordered inside their batch, and batches from different producers only
//! interleave at flush boundaries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{error, trace};

use crate::async_op::{new_consumer_tag, AsyncOpCompleter, ConsumerTag};
use crate::command::Command;
use crate::errors::QueueError;
use crate::stats::QueueStats;

// ----------------------------------------------------------------------------
// Flush Batch
// ----------------------------------------------------------------------------

/// One flush's worth of commands, in submission order, with an optional
/// fence signalled after the last command executes
pub struct Batch {
    commands: Vec<Command>,
    fence: Option<AsyncOpCompleter>,
}

impl Batch {
    pub fn new(commands: Vec<Command>, fence: Option<AsyncOpCompleter>) -> Self {
        Self { commands, fence }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl core::fmt::Debug for Batch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Batch")
            .field("commands", &self.commands.len())
            .field("fenced", &self.fence.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Shared Queue
// ----------------------------------------------------------------------------

struct SharedInner {
    batches: VecDeque<Batch>,
    shutdown: bool,
}

/// The multi-producer/single-consumer hand-off structure between producer
/// queues and the core thread
pub struct SharedQueue {
    inner: Mutex<SharedInner>,
    available: Condvar,
    consumer: ConsumerTag,
    stats: QueueStats,
    next_command_id: AtomicU64,
}

impl SharedQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SharedInner {
                batches: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
            consumer: new_consumer_tag(),
            stats: QueueStats::new(),
            next_command_id: AtomicU64::new(0),
        }
    }

    /// Tag identifying the bound core thread; cloned into every handle that
    /// may block
    pub fn consumer_tag(&self) -> ConsumerTag {
        self.consumer.clone()
    }

    /// Bind the calling thread as the single consumer
    ///
    /// # Panics
    ///
    /// Panics if a different thread has already bound itself; two consumer
    /// threads would break the serial-execution guarantee.
    pub fn bind_consumer(&self) {
        let current = thread::current().id();
        if let Err(_existing) = self.consumer.set(current) {
            if *self.consumer.get().expect("consumer tag set") != current {
                error!("a different thread is already bound as the core consumer");
                panic!("shared queue already has a consumer thread");
            }
        }
    }

    /// Allocate a command sequence number for tracing
    pub fn next_command_id(&self) -> u64 {
        self.next_command_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Number of flushed batches not yet drained
    pub fn pending_batches(&self) -> usize {
        self.inner.lock().expect("shared queue poisoned").batches.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().expect("shared queue poisoned").shutdown
    }

    /// Hand a flushed batch to the consumer
    ///
    /// After shutdown the batch is discarded (cancelling any attached
    /// handles) and `Err(QueueError::CoreThreadStopped)` is returned.
    pub fn submit(&self, batch: Batch) -> Result<(), QueueError> {
        let rejected;
        {
            let mut inner = self.inner.lock().expect("shared queue poisoned");
            if inner.shutdown {
                rejected = Some(batch);
            } else {
                self.stats.record_submitted(batch.len());
                inner.batches.push_back(batch);
                rejected = None;
            }
        }

        match rejected {
            Some(batch) => {
                // Dropped outside the lock; completer drops cancel handles
                self.stats.record_cancelled(batch.len());
                drop(batch);
                Err(QueueError::CoreThreadStopped)
            }
            None => {
                self.available.notify_one();
                Ok(())
            }
        }
    }

    /// Pop the next batch in arrival order, waiting up to `idle_timeout`
    ///
    /// Returns `None` once shutdown has been requested and every submitted
    /// batch has been drained, and also on an idle timeout so the caller
    /// can run periodic work; the two cases are distinguished with
    /// [`is_shut_down`](Self::is_shut_down).
    pub fn next_batch(&self, idle_timeout: Duration) -> Option<Batch> {
        let mut inner = self.inner.lock().expect("shared queue poisoned");
        loop {
            if let Some(batch) = inner.batches.pop_front() {
                return Some(batch);
            }
            if inner.shutdown {
                return None;
            }
            let (guard, result) = self
                .available
                .wait_timeout(inner, idle_timeout)
                .expect("shared queue poisoned");
            inner = guard;
            if result.timed_out() && inner.batches.is_empty() {
                return None;
            }
        }
    }

    /// Pop the next batch without waiting
    pub fn try_next_batch(&self) -> Option<Batch> {
        self.inner
            .lock()
            .expect("shared queue poisoned")
            .batches
            .pop_front()
    }

    /// Execute every command of `batch` in order, then signal its fence
    ///
    /// Must only be called by the bound consumer thread. If a command body
    /// panics, the panicking command and the rest of the batch are recorded
    /// as discarded before the unwind continues, so the traffic counters
    /// still balance.
    pub fn execute_batch(&self, batch: Batch) {
        debug_assert_eq!(
            self.consumer.get().copied(),
            Some(thread::current().id()),
            "execute_batch called off the consumer thread"
        );
        let Batch { commands, fence } = batch;
        let mut unexecuted = BatchRemainder {
            stats: &self.stats,
            count: commands.len(),
        };
        for command in commands {
            trace!(command_id = command.id(), "executing command");
            command.execute();
            unexecuted.count -= 1;
            self.stats.record_executed();
        }
        drop(unexecuted);
        if let Some(mut fence) = fence {
            fence.complete(());
        }
    }

    /// Request shutdown and wake the consumer
    ///
    /// Batches already submitted will still be drained and executed;
    /// subsequent submissions fail.
    pub fn request_shutdown(&self) {
        {
            let mut inner = self.inner.lock().expect("shared queue poisoned");
            inner.shutdown = true;
        }
        self.available.notify_all();
    }
}

impl Default for SharedQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Accounts for commands lost when a batch unwinds mid-execution
struct BatchRemainder<'a> {
    stats: &'a QueueStats,
    count: usize,
}

impl Drop for BatchRemainder<'_> {
    fn drop(&mut self) {
        if self.count > 0 {
            self.stats.record_discarded(self.count);
        }
    }
}

impl Drop for SharedQueue {
    fn drop(&mut self) {
        // Undrained commands cancel their handles via completer drops
        let inner = self.inner.get_mut().expect("shared queue poisoned");
        let undrained: usize = inner.batches.iter().map(Batch::len).sum();
        if undrained > 0 {
            self.stats.record_discarded(undrained);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
