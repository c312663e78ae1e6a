//! One-Shot Asynchronous Operation Handles
//!
//! An [`AsyncOp`] is a shared, one-shot completion cell for a value produced
//! by exactly one executed command. The handle side ([`AsyncOp`]) may be
//! polled, blocked on, or awaited from any thread; the writer side
//! ([`AsyncOpCompleter`]) lives inside the queued command and is driven by
//! the core thread.
//!
//! Completion is published with release ordering on an atomic state flag, so
//! any thread that observes `has_completed() == true` also observes the
//! stored value. The flag transitions `Pending → Completed` or
//! `Pending → Cancelled` exactly once and never reverses.

use core::any::{self, Any};
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicU8, Ordering};
use core::task::{Context, Poll};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, ThreadId};

use futures::task::AtomicWaker;
use tracing::error;

use crate::errors::AsyncOpError;

// ----------------------------------------------------------------------------
// Consumer Tag
// ----------------------------------------------------------------------------

/// Identity of the single consumer (core) thread, bound once when the core
/// loop starts. Blocking waits consult it to fail fast on self-deadlock.
pub type ConsumerTag = Arc<OnceLock<ThreadId>>;

/// Create an unbound consumer tag
pub fn new_consumer_tag() -> ConsumerTag {
    Arc::new(OnceLock::new())
}

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const CANCELLED: u8 = 2;

enum OpState {
    Pending,
    Completed {
        value: Box<dyn Any + Send>,
        type_name: &'static str,
    },
    Cancelled,
}

struct OpShared {
    state: Mutex<OpState>,
    /// Mirrors `state` for lock-free completion checks
    flag: AtomicU8,
    done: Condvar,
    waker: AtomicWaker,
    consumer: ConsumerTag,
}

impl OpShared {
    fn resolve(&self, next: OpState, flag: u8) {
        {
            let mut state = self.state.lock().expect("async op state poisoned");
            debug_assert!(matches!(*state, OpState::Pending));
            *state = next;
            self.flag.store(flag, Ordering::Release);
        }
        self.done.notify_all();
        self.waker.wake();
    }
}

// ----------------------------------------------------------------------------
// AsyncOp Handle
// ----------------------------------------------------------------------------

/// Reader handle to a one-shot cross-thread operation result
///
/// Cloneable and usable from any thread. Obtained from
/// `CoreAccessor::queue_return_command` (or [`AsyncOp::pair`] directly when
/// wiring a custom host). The handle outlives the queue machinery, so a
/// caller may retain it after its accessor is gone.
#[derive(Clone)]
pub struct AsyncOp {
    shared: Arc<OpShared>,
}

impl AsyncOp {
    /// Create a connected handle/completer pair
    ///
    /// `consumer` identifies the thread that will drive the completer; pass
    /// the tag of the shared queue the command will travel through.
    pub fn pair(consumer: ConsumerTag) -> (AsyncOp, AsyncOpCompleter) {
        let shared = Arc::new(OpShared {
            state: Mutex::new(OpState::Pending),
            flag: AtomicU8::new(PENDING),
            done: Condvar::new(),
            waker: AtomicWaker::new(),
            consumer,
        });
        (
            AsyncOp {
                shared: shared.clone(),
            },
            AsyncOpCompleter {
                shared,
                resolved: false,
            },
        )
    }

    /// Non-blocking completion check, safe from any thread
    pub fn has_completed(&self) -> bool {
        self.shared.flag.load(Ordering::Acquire) == COMPLETED
    }

    /// True once the operation completed *or* was cancelled
    pub fn is_resolved(&self) -> bool {
        self.shared.flag.load(Ordering::Acquire) != PENDING
    }

    /// True if the backing command was discarded before executing
    pub fn is_cancelled(&self) -> bool {
        self.shared.flag.load(Ordering::Acquire) == CANCELLED
    }

    /// Suspend the calling thread until the operation resolves
    ///
    /// Returns `Err(AsyncOpError::Cancelled)` if the backing command was
    /// discarded instead of executed.
    ///
    /// # Panics
    ///
    /// Panics if called from the core thread while the operation is still
    /// pending: only the core thread can complete it, so the wait could
    /// never return. This is a structural bug in the caller, not a
    /// recoverable condition.
    pub fn wait(&self) -> Result<(), AsyncOpError> {
        if self.shared.flag.load(Ordering::Acquire) == PENDING {
            if let Some(core_thread) = self.shared.consumer.get() {
                if *core_thread == thread::current().id() {
                    error!(
                        "AsyncOp::wait() called from the core thread while pending; \
                         only the core thread can complete this operation"
                    );
                    panic!("deadlock: AsyncOp::wait() called from the core thread");
                }
            }

            let mut state = self.shared.state.lock().expect("async op state poisoned");
            while matches!(*state, OpState::Pending) {
                state = self
                    .shared
                    .done
                    .wait(state)
                    .expect("async op state poisoned");
            }
        }

        match self.shared.flag.load(Ordering::Acquire) {
            COMPLETED => Ok(()),
            _ => Err(AsyncOpError::Cancelled),
        }
    }

    /// Retrieve the stored value
    ///
    /// Never blocks. Fails with [`AsyncOpError::NotReady`] before
    /// resolution (callers that want to wait must call [`wait`](Self::wait)
    /// first), [`AsyncOpError::TypeMismatch`] if `T` is not the stored type,
    /// and [`AsyncOpError::Cancelled`] if no value will ever arrive.
    ///
    /// `T: Clone` so the value can be read by multiple holders of the
    /// handle.
    pub fn value<T: Any + Clone>(&self) -> Result<T, AsyncOpError> {
        match self.shared.flag.load(Ordering::Acquire) {
            PENDING => Err(AsyncOpError::NotReady),
            CANCELLED => Err(AsyncOpError::Cancelled),
            _ => {
                let state = self.shared.state.lock().expect("async op state poisoned");
                match &*state {
                    OpState::Completed { value, type_name } => value
                        .downcast_ref::<T>()
                        .cloned()
                        .ok_or(AsyncOpError::TypeMismatch {
                            requested: any::type_name::<T>(),
                            actual: type_name,
                        }),
                    _ => unreachable!("flag says completed but state disagrees"),
                }
            }
        }
    }
}

impl core::fmt::Debug for AsyncOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = match self.shared.flag.load(Ordering::Acquire) {
            COMPLETED => "completed",
            CANCELLED => "cancelled",
            _ => "pending",
        };
        f.debug_struct("AsyncOp").field("state", &state).finish()
    }
}

/// Resolves once the operation completes or is cancelled
impl Future for AsyncOp {
    type Output = Result<(), AsyncOpError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.shared.flag.load(Ordering::Acquire) {
            COMPLETED => return Poll::Ready(Ok(())),
            CANCELLED => return Poll::Ready(Err(AsyncOpError::Cancelled)),
            _ => {}
        }
        self.shared.waker.register(cx.waker());
        // Re-check to close the register/resolve race
        match self.shared.flag.load(Ordering::Acquire) {
            COMPLETED => Poll::Ready(Ok(())),
            CANCELLED => Poll::Ready(Err(AsyncOpError::Cancelled)),
            _ => Poll::Pending,
        }
    }
}

// ----------------------------------------------------------------------------
// AsyncOpCompleter
// ----------------------------------------------------------------------------

/// Writer half of an [`AsyncOp`]
///
/// Travels inside the queued command and is driven by the core thread after
/// the command body finishes. Dropping a completer that never completed
/// cancels the handle, so readers blocked in [`AsyncOp::wait`] always make
/// progress even when the command is discarded.
pub struct AsyncOpCompleter {
    shared: Arc<OpShared>,
    resolved: bool,
}

impl AsyncOpCompleter {
    /// Publish the operation's value; callable at most once
    ///
    /// # Panics
    ///
    /// Panics on a second call. Completing twice means two command bodies
    /// share one completer, which the queue never produces.
    pub fn complete<T: Any + Send>(&mut self, value: T) {
        if self.resolved {
            error!("AsyncOpCompleter::complete() called twice");
            panic!("async operation completed twice");
        }
        self.resolved = true;
        self.shared.resolve(
            OpState::Completed {
                value: Box::new(value),
                type_name: any::type_name::<T>(),
            },
            COMPLETED,
        );
    }

    /// True once this completer has published a value
    pub fn has_completed(&self) -> bool {
        self.resolved
    }
}

impl Drop for AsyncOpCompleter {
    fn drop(&mut self) {
        if !self.resolved {
            self.shared.resolve(OpState::Cancelled, CANCELLED);
        }
    }
}

impl core::fmt::Debug for AsyncOpCompleter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncOpCompleter")
            .field("resolved", &self.resolved)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
