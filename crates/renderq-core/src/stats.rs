//! Queue Health Monitoring
//!
//! Atomic counters tracking command traffic through the shared queue.
//! Producers and the core thread update these concurrently, so everything
//! is lock-free; readers take a consistent-enough [`StatsSnapshot`].

use core::sync::atomic::{AtomicU64, Ordering};

// ----------------------------------------------------------------------------
// Queue Statistics
// ----------------------------------------------------------------------------

/// Command traffic statistics for one shared queue
///
/// Uses atomic counters to prevent race conditions between producers and the
/// core thread.
#[derive(Debug, Default)]
pub struct QueueStats {
    commands_submitted: AtomicU64,
    commands_executed: AtomicU64,
    commands_cancelled: AtomicU64,
    commands_discarded: AtomicU64,
    batches_submitted: AtomicU64,
    frames_ticked: AtomicU64,
}

impl QueueStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record commands handed to the shared queue in one flush (thread-safe)
    pub fn record_submitted(&self, count: usize) {
        self.commands_submitted
            .fetch_add(count as u64, Ordering::Relaxed);
        self.batches_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one executed command (thread-safe)
    pub fn record_executed(&self) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record commands dropped before ever reaching the shared queue
    /// (thread-safe)
    pub fn record_cancelled(&self, count: usize) {
        self.commands_cancelled
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record submitted commands dropped without executing (thread-safe)
    ///
    /// Distinct from [`record_cancelled`](Self::record_cancelled): these
    /// commands count against `commands_submitted`, so they must also count
    /// as retired for [`StatsSnapshot::commands_pending`] to reconcile.
    pub fn record_discarded(&self, count: usize) {
        self.commands_discarded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record one core-loop frame tick (thread-safe)
    pub fn record_frame(&self) {
        self.frames_ticked.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commands_submitted: self.commands_submitted.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            commands_cancelled: self.commands_cancelled.load(Ordering::Relaxed),
            commands_discarded: self.commands_discarded.load(Ordering::Relaxed),
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            frames_ticked: self.frames_ticked.load(Ordering::Relaxed),
        }
    }
}

// ----------------------------------------------------------------------------
// Snapshot
// ----------------------------------------------------------------------------

/// Plain-value snapshot of [`QueueStats`] counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    /// Commands handed to the shared queue by all producers
    pub commands_submitted: u64,
    /// Commands the core thread has executed
    pub commands_executed: u64,
    /// Commands dropped before reaching the shared queue (local cancel, or
    /// a flush rejected after shutdown)
    pub commands_cancelled: u64,
    /// Submitted commands dropped without executing (shutdown leftovers, or
    /// the remainder of a batch whose command panicked)
    pub commands_discarded: u64,
    /// Flush batches handed to the shared queue
    pub batches_submitted: u64,
    /// Drain cycles the core thread has completed
    pub frames_ticked: u64,
}

impl StatsSnapshot {
    /// Commands handed to the shared queue but not yet retired
    ///
    /// Every submitted command is eventually executed or discarded, so this
    /// drains to zero. Cancelled commands never reached the shared queue and
    /// do not enter the balance.
    pub fn commands_pending(&self) -> u64 {
        self.commands_submitted
            .saturating_sub(self.commands_executed + self.commands_discarded)
    }
}
