//! Centralized Configuration Management
//!
//! This module consolidates the configuration structures used throughout the
//! renderq subsystem to provide a unified, consistent configuration
//! interface.

use crate::errors::CoreQueueError;
use core::time::Duration;

// ----------------------------------------------------------------------------
// Queue Configuration
// ----------------------------------------------------------------------------

/// Configuration for a producer-side command queue
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueueConfig {
    /// Initial capacity of the local command buffer, in commands
    pub local_buffer_capacity: usize,
    /// Pending-command count above which the queue logs a warning on flush
    pub warn_pending_threshold: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            local_buffer_capacity: 64, // one frame's worth of commands for most producers
            warn_pending_threshold: 4096,
        }
    }
}

impl QueueConfig {
    /// Create a configuration for low-volume producers (tool threads)
    pub fn low_volume() -> Self {
        Self {
            local_buffer_capacity: 8,
            warn_pending_threshold: 512,
        }
    }
}

// ----------------------------------------------------------------------------
// Core Thread Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration for the core execution thread
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoreConfig {
    /// Producer queue configuration handed to each accessor
    pub queue: QueueConfig,
    /// How long the core thread sleeps on an empty queue before re-checking
    /// for shutdown
    pub idle_poll_interval: Duration,
    /// Name given to the spawned core OS thread
    pub thread_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            idle_poll_interval: Duration::from_millis(100),
            thread_name: "renderq-core".to_string(),
        }
    }
}

impl CoreConfig {
    /// Create configuration optimized for testing (tight idle polling so
    /// shutdown is fast)
    pub fn testing() -> Self {
        Self {
            queue: QueueConfig::default(),
            idle_poll_interval: Duration::from_millis(5),
            thread_name: "renderq-core-test".to_string(),
        }
    }

    /// Validate the configuration, returning a reason string on failure
    pub fn validate(&self) -> Result<(), CoreQueueError> {
        if self.queue.local_buffer_capacity == 0 {
            return Err(CoreQueueError::config_error(
                "queue.local_buffer_capacity must be non-zero",
            ));
        }
        if self.idle_poll_interval.is_zero() {
            return Err(CoreQueueError::config_error(
                "idle_poll_interval must be non-zero",
            ));
        }
        if self.thread_name.is_empty() {
            return Err(CoreQueueError::config_error("thread_name must be non-empty"));
        }
        Ok(())
    }
}
