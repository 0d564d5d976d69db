use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Result, anyhow};
use argh::{EarlyExit, FromArgs};
use nix::errno::Errno;
use std::env;
use std::io::{self, Write};
use std::os::unix::ffi::OsStringExt;

/// Names `type` reports as builtins.
pub(crate) const BUILTIN_NAMES: [&str; 4] = ["exit", "pwd", "cd", "type"];

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. Every word after the command
/// name is a positional operand, even one that starts with `-`.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// Executes the command writing its output to `stdout`.
    ///
    /// An `Err` is a user error: its message is written to `stdout` as is and
    /// the command exits with 1.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                stdout.write_all(e.to_string().as_bytes())?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        stdout.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        argv: &[&[u8]],
        _background: bool,
    ) -> Option<Box<dyn ExecutableCommand>> {
        let (name, args) = argv.split_first()?;
        if *name != T::name().as_bytes() {
            return None;
        }
        let args: Vec<String> = args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        // Operands are taken literally: `cd -x` names a directory, not a flag.
        let args: Vec<&str> = std::iter::once("--")
            .chain(args.iter().map(String::as_str))
            .collect();
        Some(match T::from_args(&[T::name()], &args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

/// Description of an OS error without the `(os error N)` suffix.
fn describe(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_raw(code).desc().to_string(),
        None => err.to_string(),
    }
}

/// The current working directory, or the reason it can't be determined.
pub(crate) fn working_dir_text() -> Vec<u8> {
    match env::current_dir() {
        Ok(dir) => dir.into_os_string().into_vec(),
        Err(e) => describe(&e).into_bytes(),
    }
}

#[derive(FromArgs)]
/// Exit the shell with status 0.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        stdout.write_all(&working_dir_text())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory.
    pub args: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let target = self
            .args
            .first()
            .ok_or_else(|| anyhow!("cd: missing argument"))?;
        env::set_current_dir(target).map_err(|_| anyhow!("Invalid directory"))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Tell whether a command is a shell builtin.
pub struct Type {
    #[argh(positional, greedy)]
    /// command name to describe.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let name = self
            .names
            .first()
            .ok_or_else(|| anyhow!("type: missing argument"))?;
        if BUILTIN_NAMES.contains(&name.as_str()) {
            write!(stdout, "{} is a shell builtin", name)?;
        } else {
            write!(stdout, "{} is external to {}", name, env.shell_name)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the retained history entries with their numbers.
pub struct History {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.state.write_history(stdout)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fresh_state, lock_process};
    use std::env as stdenv;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_env() -> Environment {
        Environment::new("shell300", fresh_state())
    }

    fn run<T: BuiltinCommand + 'static>(argv: &[&str], env: &mut Environment) -> (ExitCode, String) {
        let argv: Vec<&[u8]> = argv.iter().map(|a| a.as_bytes()).collect();
        let cmd = Factory::<T>::default()
            .try_create(env, &argv, false)
            .expect("factory should accept its own name");
        let mut out: Vec<u8> = Vec::new();
        let code = cmd.execute(&mut out, env).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    fn make_unique_temp_dir() -> io::Result<PathBuf> {
        let mut p = stdenv::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("shell300_test_cd_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&p)?;
        Ok(p)
    }

    #[test]
    fn test_factory_ignores_other_names() {
        let env = test_env();
        let argv: Vec<&[u8]> = vec![&b"ls"[..], &b"-la"[..]];
        assert!(Factory::<Pwd>::default().try_create(&env, &argv, false).is_none());
        assert!(Factory::<Cd>::default().try_create(&env, &[], false).is_none());
    }

    #[test]
    fn test_pwd_prints_current_dir_without_newline() {
        let _lock = lock_process();
        let cur = stdenv::current_dir().unwrap();
        let mut env = test_env();

        let (code, out) = run::<Pwd>(&["pwd"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, cur.to_string_lossy());
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_process();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();
        let mut env = test_env();

        let target = canonical_temp.to_string_lossy().to_string();
        let (code, out) = run::<Cd>(&["cd", &target], &mut env);
        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, 0);
        assert_eq!(out, "");
        assert_eq!(new_cwd, canonical_temp);
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_nonexistent_path_keeps_cwd() {
        let _lock = lock_process();
        let orig = stdenv::current_dir().unwrap();
        let mut env = test_env();

        let name = format!("nonexistent_dir_for_shell300_test_{}", std::process::id());
        let (code, out) = run::<Cd>(&["cd", &name], &mut env);

        assert_eq!(code, 1);
        assert_eq!(out, "Invalid directory");
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_without_argument_is_user_error() {
        let mut env = test_env();
        let (code, out) = run::<Cd>(&["cd"], &mut env);
        assert_eq!(code, 1);
        assert_eq!(out, "cd: missing argument");
    }

    #[test]
    fn test_type_reports_builtins() {
        let mut env = test_env();
        for name in BUILTIN_NAMES {
            let (code, out) = run::<Type>(&["type", name], &mut env);
            assert_eq!(code, 0);
            assert_eq!(out, format!("{} is a shell builtin", name));
        }
    }

    #[test]
    fn test_type_reports_external_with_shell_name() {
        let mut env = Environment::new("mysh", fresh_state());
        let (_, out) = run::<Type>(&["type", "ls"], &mut env);
        assert_eq!(out, "ls is external to mysh");

        let (_, out) = run::<Type>(&["type", "history"], &mut env);
        assert_eq!(out, "history is external to mysh");
    }

    #[test]
    fn test_type_without_argument_is_user_error() {
        let mut env = test_env();
        let (code, out) = run::<Type>(&["type"], &mut env);
        assert_eq!(code, 1);
        assert_eq!(out, "type: missing argument");
    }

    #[test]
    fn test_exit_requests_shutdown() {
        let mut env = test_env();
        let (code, out) = run::<Exit>(&["exit"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "");
        assert!(env.should_exit);
    }

    #[test]
    fn test_history_lists_entries() {
        let mut env = test_env();
        env.state.record(b"ls");
        env.state.record(b"cd /tmp");
        let (code, out) = run::<History>(&["history"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "1\tls\n2\tcd /tmp\n");
    }

    #[test]
    fn test_exit_ignores_dashed_operands() {
        let mut env = test_env();
        let (code, out) = run::<Exit>(&["exit", "--help"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "");
        assert!(env.should_exit);
    }

    #[test]
    fn test_type_takes_dashed_name_literally() {
        let mut env = test_env();
        let (code, out) = run::<Type>(&["type", "-a"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "-a is external to shell300");

        let (_, out) = run::<Type>(&["type", "--", "cd"], &mut env);
        assert_eq!(out, "-- is external to shell300");
    }

    #[test]
    fn test_pwd_ignores_dashed_operands() {
        let _lock = lock_process();
        let cur = stdenv::current_dir().unwrap();
        let mut env = test_env();
        let (code, out) = run::<Pwd>(&["pwd", "-L"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, cur.to_string_lossy());
    }

    #[test]
    fn test_cd_into_directory_named_like_a_flag() {
        let _lock = lock_process();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let dashed = fs::canonicalize(&temp).unwrap().join("-x");
        fs::create_dir(&dashed).expect("failed to create -x");
        let orig = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&temp).unwrap();
        let mut env = test_env();

        let (code, out) = run::<Cd>(&["cd", "-x"], &mut env);
        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, 0);
        assert_eq!(out, "");
        assert_eq!(new_cwd, dashed);
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_working_dir_text_matches_current_dir() {
        let _lock = lock_process();
        let cur = stdenv::current_dir().unwrap();
        assert_eq!(working_dir_text(), cur.into_os_string().into_vec());
    }
}
