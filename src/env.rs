use crate::history::{History, HistoryError};
use crate::interrupt::SigintMask;
use crate::lexer::LineBuffer;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide interpreter state shared with the `SIGINT` handler.
///
/// Holds the command history and the interrupt-pending flag. The main flow
/// touches the history only through the methods below, each of which blocks
/// `SIGINT` for the calling thread while it holds the lock. The handler never
/// waits for the lock: it uses [`spin::Mutex::try_lock`] and, having
/// interrupted a thread that cannot be holding it, always gets it.
///
/// A `ShellState` starts with an empty history, a zero command counter and no
/// interrupt pending.
#[derive(Debug)]
pub struct ShellState {
    history: spin::Mutex<History>,
    interrupted: AtomicBool,
}

impl ShellState {
    pub const fn new() -> Self {
        Self {
            history: spin::Mutex::new(History::new()),
            interrupted: AtomicBool::new(false),
        }
    }

    fn with_history<R>(&self, f: impl FnOnce(&mut History) -> R) -> R {
        let _mask = SigintMask::block();
        let mut history = self.history.lock();
        f(&mut history)
    }

    pub fn record(&self, line: &[u8]) {
        self.with_history(|h| h.record(line))
    }

    pub fn recall_last(&self) -> Option<LineBuffer> {
        self.with_history(|h| h.recall_last())
    }

    pub fn recall_by_number(&self, n: u64) -> Result<LineBuffer, HistoryError> {
        self.with_history(|h| h.recall_by_number(n))
    }

    /// Number of lines ever recorded.
    pub fn total(&self) -> u64 {
        self.with_history(|h| h.total())
    }

    /// Write the numbered history listing to `out`.
    pub fn write_history(&self, out: &mut dyn Write) -> std::io::Result<()> {
        self.with_history(|h| h.write_listing(out))
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// End of a read/dispatch cycle.
    pub fn clear_interrupt(&self) {
        self.interrupted.store(false, Ordering::SeqCst);
    }

    /// Body of the `SIGINT` handler.
    ///
    /// Marks the current cycle as interrupted, writes a newline and, unless
    /// nothing has been recorded yet, the same listing the `history` builtin
    /// prints. Only an atomic store, a non-blocking lock attempt and plain
    /// writes to `out` happen here. Write errors are dropped: there is nobody
    /// to report them to.
    pub fn on_interrupt(&self, out: &mut dyn Write) {
        self.interrupted.store(true, Ordering::SeqCst);
        let _ = out.write_all(b"\n");
        if let Some(history) = self.history.try_lock() {
            if history.total() > 0 {
                let _ = history.write_listing(out);
            }
        }
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-interpreter view of the process used by commands.
///
/// The environment contains:
/// - `shell_name`: the name `type` reports for commands that are not builtins.
/// - `state`: the shared history and interrupt flag.
/// - `should_exit`: set by the `exit` builtin; the driver stops once it is set.
#[derive(Debug, Clone)]
pub struct Environment {
    pub shell_name: String,
    pub state: &'static ShellState,
    pub should_exit: bool,
}

impl Environment {
    pub fn new(shell_name: impl Into<String>, state: &'static ShellState) -> Self {
        Self {
            shell_name: shell_name.into(),
            state,
            should_exit: false,
        }
    }
}
