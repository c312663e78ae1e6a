//! Core Thread Builder API
//!
//! Builder-style construction for hosts (CLI, tests, engines embedding the
//! subsystem) to configure and start the core thread and get a handle back.

use std::time::Duration;

use tracing::info;

use renderq_core::{CoreConfig, CoreQueueError, QueueConfig};

use crate::core_thread::CoreThread;

// ----------------------------------------------------------------------------
// Core Thread Builder
// ----------------------------------------------------------------------------

/// Builder for a [`CoreThread`]
pub struct CoreThreadBuilder {
    config: CoreConfig,
}

impl CoreThreadBuilder {
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the OS thread name of the core thread
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Set how long the core thread idles before re-checking for shutdown
    pub fn idle_poll_interval(mut self, interval: Duration) -> Self {
        self.config.idle_poll_interval = interval;
        self
    }

    /// Set the queue configuration handed to each accessor
    pub fn queue_config(mut self, queue: QueueConfig) -> Self {
        self.config.queue = queue;
        self
    }

    /// Validate the configuration and start the core thread
    pub fn build_and_start(self) -> Result<CoreThread, CoreQueueError> {
        info!(thread_name = %self.config.thread_name, "starting core thread");
        CoreThread::spawn(self.config)
    }
}

impl Default for CoreThreadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Convenience Functions
// ----------------------------------------------------------------------------

/// Start a core thread with the testing configuration (tight idle polling
/// so shutdown is fast)
pub fn start_test_core() -> Result<CoreThread, CoreQueueError> {
    CoreThreadBuilder::new()
        .with_config(CoreConfig::testing())
        .build_and_start()
}
