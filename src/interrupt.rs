//! `SIGINT` handling.
//!
//! The interpreter survives `Ctrl-C`: the handler prints the history and flags
//! the current cycle as interrupted. It is installed without `SA_RESTART`, so
//! a blocking read of the next line returns `EINTR` and the driver processes
//! that cycle as an empty line.

use crate::env::ShellState;
use crate::io_adapters::RawStdout;
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};

static SHELL: ShellState = ShellState::new();

/// The process-wide state the installed handler reads.
pub fn shell_state() -> &'static ShellState {
    &SHELL
}

extern "C" fn handle_sigint(_signal: libc::c_int) {
    preserving_errno(|| SHELL.on_interrupt(&mut RawStdout));
}

/// Run `f` and put `errno` back the way it was, so a failed write in the
/// handler can't change the error the interrupted call reports.
fn preserving_errno<R>(f: impl FnOnce() -> R) -> R {
    let saved = Errno::last_raw();
    let result = f();
    Errno::set_raw(saved);
    result
}

/// Route `SIGINT` to the history-printing handler.
pub fn install() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only performs an atomic store, a non-blocking lock
    // attempt and write(2) calls.
    unsafe { signal::sigaction(Signal::SIGINT, &action) }?;
    Ok(())
}

/// Keeps `SIGINT` blocked on the current thread until dropped.
///
/// A signal arriving meanwhile stays pending and is delivered when the
/// previous mask is restored.
pub(crate) struct SigintMask {
    previous: Option<SigSet>,
}

impl SigintMask {
    pub(crate) fn block() -> Self {
        let mut set = SigSet::empty();
        set.add(Signal::SIGINT);
        let mut previous = SigSet::empty();
        let previous = signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut previous))
            .ok()
            .map(|()| previous);
        Self { previous }
    }
}

impl Drop for SigintMask {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&previous), None);
        }
    }
}
