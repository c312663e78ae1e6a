//! Deferred Command Representation
//!
//! A [`Command`] is one deferred invocation: a boxed closure over its
//! captured arguments, optionally paired with the writer half of an
//! [`AsyncOp`](crate::AsyncOp). Commands are owned exclusively by their
//! producer-side queue until flushed, then by the shared queue, and are
//! consumed when the core thread executes them.
//!
//! A command destroyed without executing cancels its completer (see
//! [`AsyncOpCompleter`]), so result handles never dangle unresolved.

use tracing::warn;

use crate::async_op::AsyncOpCompleter;

// ----------------------------------------------------------------------------
// Command
// ----------------------------------------------------------------------------

/// Fire-and-forget invocation body
pub type CommandFn = Box<dyn FnOnce() + Send + 'static>;

/// Invocation body that writes its result into the supplied completer
/// before returning
pub type ReturnCommandFn = Box<dyn FnOnce(&mut AsyncOpCompleter) + Send + 'static>;

enum CommandKind {
    Fire(CommandFn),
    Return {
        body: ReturnCommandFn,
        completer: AsyncOpCompleter,
    },
}

/// One deferred invocation plus optional result sink
pub struct Command {
    id: u64,
    kind: CommandKind,
}

impl Command {
    /// Create a fire-and-forget command
    pub fn fire<F>(id: u64, body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id,
            kind: CommandKind::Fire(Box::new(body)),
        }
    }

    /// Create a result-bearing command bound to `completer`
    pub fn with_result<F>(id: u64, body: F, completer: AsyncOpCompleter) -> Self
    where
        F: FnOnce(&mut AsyncOpCompleter) + Send + 'static,
    {
        Self {
            id,
            kind: CommandKind::Return {
                body: Box::new(body),
                completer,
            },
        }
    }

    /// Sequence number assigned at queue time, for tracing
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True if this command carries a result completer
    pub fn has_result(&self) -> bool {
        matches!(self.kind, CommandKind::Return { .. })
    }

    /// Run the invocation body, resolving the attached completer if any
    ///
    /// A return-command body is expected to complete its op as its final
    /// act. If it returns without doing so, the op is completed with `()`
    /// after a warning so that waiters still make progress.
    pub fn execute(self) {
        match self.kind {
            CommandKind::Fire(body) => body(),
            CommandKind::Return {
                body,
                mut completer,
            } => {
                body(&mut completer);
                if !completer.has_completed() {
                    warn!(
                        command_id = self.id,
                        "return command finished without completing its async op; \
                         completing with ()"
                    );
                    completer.complete(());
                }
            }
        }
    }
}

impl core::fmt::Debug for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("has_result", &self.has_result())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
