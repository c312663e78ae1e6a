//! renderq Runtime
//!
//! The execution side of the renderq subsystem:
//! - [`CoreThread`]: the single dedicated consumer thread draining and
//!   executing flushed command batches in arrival order
//! - [`CoreHandle`]: cloneable handle from which producer threads create
//!   accessors
//! - [`CoreAccessor`]: the per-producer façade (queue, submit, cancel)
//! - [`CoreThreadBuilder`]: configuration and startup
//!
//! `renderq-core` provides the stable queue/handle building blocks; this
//! crate is the engine that drives them.

pub mod accessor;
pub mod builder;
mod core_thread;

pub use accessor::CoreAccessor;
pub use builder::{start_test_core, CoreThreadBuilder};
pub use core_thread::{CoreHandle, CoreThread};

// Re-export core types for convenience
pub use renderq_core::{
    AsyncOp, AsyncOpCompleter, AsyncOpError, CoreConfig, CoreQueueError, MultiProducer,
    QueueConfig, QueueError, SingleProducer, StatsSnapshot,
};
