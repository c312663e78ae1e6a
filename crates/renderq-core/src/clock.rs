//! Core-Loop Frame Clock
//!
//! Per-frame time bookkeeping for the core execution loop: delta since the
//! previous frame, elapsed time since startup, and a monotonically
//! increasing frame number.
//!
//! The clock lives inside a [`CoreContext`] that is constructed once at
//! startup and owned by the core loop — components that need time receive
//! the context explicitly rather than reaching through ambient global
//! state.

use std::time::{Duration, Instant};

// ----------------------------------------------------------------------------
// Frame Clock
// ----------------------------------------------------------------------------

/// Frame timing driven by the core loop, one tick per drain cycle
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    frame_delta: Duration,
    frame_number: u64,
    first_frame: bool,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            frame_delta: Duration::ZERO,
            frame_number: 0,
            first_frame: true,
        }
    }

    /// Advance the clock by one frame
    ///
    /// The first tick reports a zero delta, since there is no previous
    /// frame to measure against.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if self.first_frame {
            self.frame_delta = Duration::ZERO;
            self.first_frame = false;
        } else {
            self.frame_delta = now - self.last_frame;
        }
        self.last_frame = now;
        self.frame_number += 1;
    }

    /// Time between the two most recent ticks
    pub fn frame_delta(&self) -> Duration {
        self.frame_delta
    }

    /// Time since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Number of ticks so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Core Context
// ----------------------------------------------------------------------------

/// Auxiliary services owned by the core loop
///
/// Built once at startup and handed to the loop; replaces singleton access
/// to shared services.
#[derive(Debug, Default)]
pub struct CoreContext {
    clock: FrameClock,
}

impl CoreContext {
    pub fn new() -> Self {
        Self {
            clock: FrameClock::new(),
        }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }
}
