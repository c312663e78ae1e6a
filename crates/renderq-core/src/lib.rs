//! renderq Core
//!
//! Foundational types for the renderq cross-thread deferred-command
//! subsystem: the producer-side [`CommandQueue`] with its synchronization
//! policies, the one-shot [`AsyncOp`] result handle, the consumer-visible
//! [`SharedQueue`], and the configuration, statistics, and frame-clock
//! support around them.
//!
//! The execution side (the core thread itself and the per-producer accessor
//! façade) lives in `renderq-runtime`; this crate provides the stable
//! building blocks.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod async_op;
pub mod clock;
pub mod command;
pub mod config;
pub mod errors;
pub mod queue;
pub mod shared;
pub mod stats;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use async_op::{new_consumer_tag, AsyncOp, AsyncOpCompleter, ConsumerTag};
pub use clock::{CoreContext, FrameClock};
pub use command::Command;
pub use config::{CoreConfig, QueueConfig};
pub use errors::{AsyncOpError, CoreQueueError, QueueError, Result};
pub use queue::{CommandQueue, MultiProducer, SingleProducer, SyncPolicy};
pub use shared::{Batch, SharedQueue};
pub use stats::{QueueStats, StatsSnapshot};
