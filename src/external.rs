//! Launching external programs.
//!
//! Programs are started with `fork` + `execvp`, so they are looked up in
//! `PATH` and receive the command line exactly as tokenized, `argv[0]`
//! included. Foreground children are waited for; background children are
//! left running and collected later by [`reap_zombies`].

use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::io_adapters::RawStdout;
use anyhow::{Context, Result};
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::CString;
use std::io::Write;

/// Command that is not a builtin.
pub struct ExternalCommand {
    argv: Vec<CString>,
    background: bool,
}

impl ExternalCommand {
    /// Build a command from raw argument bytes.
    ///
    /// Fails if an argument contains a NUL byte, which the tokenizer never
    /// produces.
    pub fn new(argv: &[&[u8]], background: bool) -> Result<Self> {
        let argv = argv
            .iter()
            .map(|arg| CString::new(*arg))
            .collect::<Result<Vec<_>, _>>()
            .context("argument contains a NUL byte")?;
        Ok(Self { argv, background })
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        _env: &Environment,
        argv: &[&[u8]],
        background: bool,
    ) -> Option<Box<dyn ExecutableCommand>> {
        if argv.is_empty() {
            return None;
        }
        match ExternalCommand::new(argv, background) {
            Ok(cmd) => Some(Box::new(cmd)),
            Err(e) => {
                warn!("cannot launch {:?}: {:#}", String::from_utf8_lossy(argv[0]), e);
                None
            }
        }
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let child = spawn(&self.argv)?;
        if self.background {
            debug!("started {:?} in background as {}", self.argv[0], child);
            return Ok(0);
        }
        Ok(wait_foreground(child))
    }
}

/// Fork and exec `argv` in the child.
///
/// When exec fails the child prints `Unknown command` and exits with status 0,
/// so a mistyped name never shows up as a failing exit status. Only a failed
/// fork is reported as an error; there is no way to make progress without one.
pub fn spawn(argv: &[CString]) -> Result<Pid> {
    let program = argv.first().context("empty command line")?;
    // The child must not allocate, so the NULL-terminated argv is built here.
    let mut args: Vec<*const libc::c_char> = argv.iter().map(|arg| arg.as_ptr()).collect();
    args.push(std::ptr::null());

    // SAFETY: the child only calls execvp, write(2) and _exit, all of which
    // are async-signal-safe, and touches no memory allocated after the fork.
    match unsafe { unistd::fork() }.context("fork failed")? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            // SAFETY: `program` and every entry of `args` point to live
            // NUL-terminated strings, and `args` ends with a null pointer.
            unsafe { libc::execvp(program.as_ptr(), args.as_ptr()) };
            let _ = RawStdout.write_all(b"Unknown command");
            // SAFETY: ends the forked child without running the parent's
            // destructors or atexit handlers.
            unsafe { libc::_exit(0) }
        }
    }
}

/// Block until `child` terminates and return its exit code.
///
/// Waits interrupted by a signal are restarted.
pub fn wait_foreground(child: Pid) -> ExitCode {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, signal, _)) => return 128 + signal as i32,
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!("error waiting for child {}: {}", child, e);
                return -1;
            }
        }
    }
}

/// Collect every child that has already terminated, without blocking.
///
/// Returns the number of children reaped.
pub fn reap_zombies() -> usize {
    let mut reaped = 0;
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => {
                debug!("reaped {:?}", status);
                reaped += 1;
            }
            Err(Errno::EINTR) => continue,
            Err(_) => break,
        }
    }
    reaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fresh_state, lock_process};
    use std::thread;
    use std::time::{Duration, Instant};

    fn argv(args: &[&str]) -> Vec<CString> {
        args.iter().map(|a| CString::new(*a).unwrap()).collect()
    }

    fn reap_until(expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut reaped = 0;
        while reaped < expected && Instant::now() < deadline {
            reaped += reap_zombies();
            thread::sleep(Duration::from_millis(10));
        }
        reaped
    }

    #[test]
    fn test_foreground_exit_codes() {
        let _lock = lock_process();
        assert_eq!(wait_foreground(spawn(&argv(&["true"])).unwrap()), 0);
        assert_eq!(wait_foreground(spawn(&argv(&["false"])).unwrap()), 1);
        assert_eq!(
            wait_foreground(spawn(&argv(&["sh", "-c", "exit 7"])).unwrap()),
            7
        );
    }

    #[test]
    fn test_child_receives_every_argument() {
        let _lock = lock_process();
        let child = spawn(&argv(&["sh", "-c", "exit $#", "sh", "one", "two", "three"])).unwrap();
        assert_eq!(wait_foreground(child), 3);
    }

    #[test]
    fn test_signal_death_is_128_plus_signal() {
        let _lock = lock_process();
        let child = spawn(&argv(&["sh", "-c", "kill -9 $$"])).unwrap();
        assert_eq!(wait_foreground(child), 128 + 9);
    }

    #[test]
    fn test_unknown_command_exits_successfully() {
        let _lock = lock_process();
        let child = spawn(&argv(&["shell300-no-such-program"])).unwrap();
        assert_eq!(wait_foreground(child), 0);
    }

    #[test]
    fn test_reap_without_children_returns_zero() {
        let _lock = lock_process();
        assert_eq!(reap_zombies(), 0);
    }

    #[test]
    fn test_background_children_are_reaped_later() {
        let _lock = lock_process();
        let started = Instant::now();
        let children: Vec<Pid> = (0..5).map(|_| spawn(&argv(&["true"])).unwrap()).collect();
        assert!(started.elapsed() < Duration::from_secs(5));

        assert_eq!(reap_until(children.len()), children.len());
        for child in children {
            assert_eq!(
                waitpid(child, Some(WaitPidFlag::WNOHANG)),
                Err(Errno::ECHILD)
            );
        }
    }

    #[test]
    fn test_background_command_does_not_block() {
        let _lock = lock_process();
        let mut env = Environment::new("shell300", fresh_state());
        let args: Vec<&[u8]> = vec![&b"sleep"[..], &b"1"[..]];
        let cmd = Factory::<ExternalCommand>::default()
            .try_create(&env, &args, true)
            .unwrap();

        let mut out: Vec<u8> = Vec::new();
        let started = Instant::now();
        let code = cmd.execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 0);
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(reap_until(1), 1);
    }

    #[test]
    fn test_argument_with_nul_is_rejected() {
        let env = Environment::new("shell300", fresh_state());
        let args: Vec<&[u8]> = vec![&b"echo"[..], &b"a\0b"[..]];
        assert!(
            Factory::<ExternalCommand>::default()
                .try_create(&env, &args, false)
                .is_none()
        );
    }
}
