//! Core Execution Thread
//!
//! [`CoreThread`] owns the single dedicated consumer thread that drains
//! flushed command batches in arrival order and executes them serially,
//! never running two commands concurrently. [`CoreHandle`] is the cloneable
//! side from which producer threads create accessors and read stats.
//!
//! ## Lifecycle
//!
//! The loop binds itself as the shared queue's consumer on startup, drains
//! batches until shutdown is requested, and then drains whatever was already
//! submitted before exiting — commands that made it into the shared queue
//! always execute. Dropping the controller without an explicit
//! [`shutdown`](CoreThread::shutdown) requests one and joins.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use renderq_core::{
    CommandQueue, CoreConfig, CoreContext, CoreQueueError, MultiProducer, QueueConfig, QueueError,
    SharedQueue, SingleProducer, StatsSnapshot,
};

use crate::accessor::CoreAccessor;

// ----------------------------------------------------------------------------
// Core Handle
// ----------------------------------------------------------------------------

/// Cloneable handle to a running core thread
///
/// Producer threads clone the handle and create their accessors from it;
/// an accessor must be created on the thread that will use it when the
/// single-producer policy is in play.
#[derive(Clone)]
pub struct CoreHandle {
    shared: Arc<SharedQueue>,
    queue_config: QueueConfig,
}

impl CoreHandle {
    /// Create a single-producer accessor bound to the calling thread
    pub fn accessor(&self) -> CoreAccessor<SingleProducer> {
        CoreAccessor::new(CommandQueue::new(self.shared.clone(), &self.queue_config))
    }

    /// Create an accessor whose queue may be shared by several producer
    /// threads
    pub fn shared_accessor(&self) -> Arc<CoreAccessor<MultiProducer>> {
        Arc::new(CoreAccessor::new(CommandQueue::new(
            self.shared.clone(),
            &self.queue_config,
        )))
    }

    /// Point-in-time command traffic counters
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats().snapshot()
    }

    /// False once shutdown has been requested
    pub fn is_running(&self) -> bool {
        !self.shared.is_shut_down()
    }
}

impl core::fmt::Debug for CoreHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CoreHandle")
            .field("running", &self.is_running())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Core Thread
// ----------------------------------------------------------------------------

/// Controller for the core execution thread
pub struct CoreThread {
    handle: CoreHandle,
    join: Option<JoinHandle<()>>,
}

impl CoreThread {
    /// Validate `config` and spawn the core thread
    pub fn spawn(config: CoreConfig) -> Result<Self, CoreQueueError> {
        config.validate()?;

        let shared = Arc::new(SharedQueue::new());
        let loop_shared = shared.clone();
        let idle = config.idle_poll_interval;

        let join = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_core_loop(loop_shared, idle))
            .map_err(|e| {
                CoreQueueError::config_error(format!("failed to spawn core thread: {e}"))
            })?;

        info!(thread_name = %config.thread_name, "core thread spawned");

        Ok(Self {
            handle: CoreHandle {
                shared,
                queue_config: config.queue,
            },
            join: Some(join),
        })
    }

    /// Get a cloneable handle for producer threads
    pub fn handle(&self) -> CoreHandle {
        self.handle.clone()
    }

    /// Point-in-time command traffic counters
    pub fn stats(&self) -> StatsSnapshot {
        self.handle.stats()
    }

    /// Request shutdown and wait for the core thread to finish
    ///
    /// Already-submitted batches are drained and executed first. Idempotent;
    /// fails with [`QueueError::CoreThreadPanicked`] if a command body
    /// panicked the loop.
    pub fn shutdown(&mut self) -> Result<(), CoreQueueError> {
        self.handle.shared.request_shutdown();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| CoreQueueError::from(QueueError::CoreThreadPanicked))?;
        }
        Ok(())
    }
}

impl Drop for CoreThread {
    fn drop(&mut self) {
        if self.join.is_some() {
            if let Err(e) = self.shutdown() {
                warn!("core thread shut down abnormally: {e}");
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Core Loop
// ----------------------------------------------------------------------------

/// Loop entry point: on any exit, including a panicking command body, mark
/// the queue shut down and cancel undrained work so blocked producers and
/// handle waiters make progress instead of hanging.
fn run_core_loop(shared: Arc<SharedQueue>, idle: Duration) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        drain_until_shutdown(&shared, idle)
    }));

    shared.request_shutdown();
    while let Some(batch) = shared.try_next_batch() {
        shared.stats().record_discarded(batch.len());
        drop(batch);
    }

    if let Err(payload) = result {
        warn!("core loop terminated by a panicking command body");
        std::panic::resume_unwind(payload);
    }
}

/// The consumer loop body: drain, execute, tick
fn drain_until_shutdown(shared: &SharedQueue, idle: Duration) {
    shared.bind_consumer();
    let mut context = CoreContext::new();
    info!("core thread started");

    loop {
        let Some(batch) = shared.next_batch(idle) else {
            if shared.is_shut_down() {
                break;
            }
            continue;
        };

        trace!(commands = batch.len(), "draining batch");
        shared.execute_batch(batch);

        // Everything already flushed belongs to this frame
        while let Some(batch) = shared.try_next_batch() {
            shared.execute_batch(batch);
        }

        context.clock_mut().tick();
        shared.stats().record_frame();
    }

    debug!(
        frames = context.clock().frame_number(),
        elapsed_ms = context.clock().elapsed().as_millis() as u64,
        "core loop drained"
    );
    info!("core thread stopped");
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
