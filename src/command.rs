use crate::env::Environment;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Children killed by a signal report `128 + signal`, as POSIX shells do.
pub type ExitCode = i32;

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command, writing any output of its own to `stdout`.
    ///
    /// An `Err` is fatal for the interpreter; user errors are reported on
    /// `stdout` and turned into a non-zero exit code instead.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a tokenized command line.
///
/// `argv[0]` is the command name as typed. Returns `None` when the factory
/// doesn't recognize the name. `background` is true when the line ended in
/// `&`; only commands that start processes care about it.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided argument vector.
    fn try_create(
        &self,
        env: &Environment,
        argv: &[&[u8]],
        background: bool,
    ) -> Option<Box<dyn ExecutableCommand>>;
}
