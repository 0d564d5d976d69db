//! A tiny interactive command interpreter with numbered history recall.
//!
//! Each input line goes through one read/dispatch cycle: it is admitted to a
//! bounded history, split into words in place, and dispatched either to a
//! builtin (`exit`, `pwd`, `cd`, `type`, `history`), to a history recall
//! (`!!`, `!<n>`), or to an external program started with `fork` and `execvp`.
//! Lines ending in `&` run in the background; finished children are reaped at
//! the end of every dispatch.
//!
//! `SIGINT` does not kill the interpreter. The handler installed by
//! [`interrupt::install`] prints the current history with raw writes and marks
//! the cycle as interrupted, which turns the line being read into a no-op.
//!
//! The main entry point is [`Interpreter`]; process-wide history and the
//! interrupt flag live in [`ShellState`].

mod builtin;
pub mod command;
pub mod env;
pub mod external;
pub mod history;
pub mod interrupt;
mod interpreter;
pub mod io_adapters;
pub mod lexer;

pub use env::{Environment, ShellState};
pub use interpreter::Interpreter;

/// Shell name printed by `type` for commands that are not builtins.
pub const DEFAULT_SHELL_NAME: &str = "shell300";

#[cfg(test)]
pub(crate) mod testing {
    use crate::env::ShellState;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Serializes tests that change the working directory or fork and reap
    /// children: `waitpid(-1)` in one test would otherwise collect another
    /// test's child.
    pub(crate) fn lock_process() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn fresh_state() -> &'static ShellState {
        Box::leak(Box::new(ShellState::new()))
    }
}
