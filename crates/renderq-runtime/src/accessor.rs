//! Per-Producer Accessor Façade
//!
//! A [`CoreAccessor`] is one producer's entry point to the core thread: it
//! binds a [`CommandQueue`] and exposes the queue/submit/cancel surface.
//! Queued commands only execute after a call to [`submit`](CoreAccessor::submit)
//! (or [`submit_and_wait`](CoreAccessor::submit_and_wait)), in the order
//! they were queued.
//!
//! Typed convenience operations — "set this render state", "bind this
//! buffer" — are thin bindings that pack their arguments into a closure and
//! call [`queue_command`](CoreAccessor::queue_command) or
//! [`queue_return_command`](CoreAccessor::queue_return_command); they add
//! no queuing behaviour of their own.

use renderq_core::{
    AsyncOp, AsyncOpCompleter, CommandQueue, QueueError, SingleProducer, SyncPolicy,
};

// ----------------------------------------------------------------------------
// Core Accessor
// ----------------------------------------------------------------------------

/// Per-producer façade over one command queue
///
/// Under the default [`SingleProducer`] policy the accessor must stay on
/// the thread that created it; calls from any other thread panic. Use
/// `CoreHandle::shared_accessor` for a queue shared between threads.
pub struct CoreAccessor<P: SyncPolicy = SingleProducer> {
    queue: CommandQueue<P>,
}

impl<P: SyncPolicy> CoreAccessor<P> {
    pub fn new(queue: CommandQueue<P>) -> Self {
        Self { queue }
    }

    /// Queue a fire-and-forget command for the core thread
    pub fn queue_command<F>(&self, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.queue(body);
    }

    /// Queue a result-bearing command; the returned handle resolves once
    /// the core thread has executed it
    pub fn queue_return_command<F>(&self, body: F) -> AsyncOp
    where
        F: FnOnce(&mut AsyncOpCompleter) + Send + 'static,
    {
        self.queue.queue_return(body)
    }

    /// Make all queued commands available to the core thread
    ///
    /// They execute as soon as the core thread is ready; all queued
    /// commands are removed from this accessor.
    pub fn submit(&self) -> Result<(), QueueError> {
        self.queue.flush()
    }

    /// As [`submit`](Self::submit), then block until the core thread has
    /// executed every command of this submission
    pub fn submit_and_wait(&self) -> Result<(), QueueError> {
        self.queue.flush_and_wait()
    }

    /// Discard all commands queued since the last submission
    ///
    /// Commands already submitted are not affected.
    pub fn cancel_all(&self) {
        self.queue.cancel_all();
    }

    /// Number of commands queued but not yet submitted
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }
}

// No Debug impl: reporting `pending` would require touching the local
// buffer, which is owner-thread-only under the single-producer policy.
