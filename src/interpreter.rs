use crate::builtin::working_dir_text;
use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::external::reap_zombies;
use crate::io_adapters::RawStdin;
use crate::lexer::{self, LineBuffer, LineReader};
use anyhow::{Context, Result};
use log::{debug, warn};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Read, Write};

/// Deepest chain of history recalls a single line may trigger.
pub const MAX_RECALL_DEPTH: usize = 16;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate: builtins and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// What the first word of a line asks for, apart from ordinary commands.
#[derive(Debug, PartialEq, Eq)]
enum Directive<'a> {
    Noop,
    RecallLast,
    RecallNumber(&'a [u8]),
    Command,
}

fn classify<'a>(argv: &[&'a [u8]], interrupted: bool) -> Directive<'a> {
    match argv.first() {
        _ if interrupted => Directive::Noop,
        None => Directive::Noop,
        Some(&b"!!") => Directive::RecallLast,
        Some(&word) if word.starts_with(b"!") => Directive::RecallNumber(&word[1..]),
        Some(_) => Directive::Command,
    }
}

/// Whether `line` may be recorded in history.
///
/// Empty lines, recall directives and lines starting with a space are left
/// out, as is anything typed during an interrupted cycle.
fn admits(line: &[u8], interrupted: bool) -> bool {
    !interrupted && !matches!(line.first(), None | Some(b'!') | Some(b' '))
}

/// Parse the `<n>` of `!<n>` as a positive decimal number.
fn parse_recall_number(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// A minimal interactive interpreter that runs builtins, external programs
/// and history recalls.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`] objects
/// that are queried, in order, to create commands from a tokenized line. See
/// [`Interpreter::new`] for the factories included out of the box.
///
/// Example
/// ```no_run
/// use shell300::{Environment, Interpreter, interrupt, io_adapters::RawStdout};
/// let env = Environment::new("shell300", interrupt::shell_state());
/// let mut sh = Interpreter::new(env, RawStdout);
/// sh.repl(true).unwrap();
/// ```
pub struct Interpreter<W: Write> {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    out: W,
}

impl<W: Write> Interpreter<W> {
    /// Create an interpreter with the default set of commands:
    /// - built-ins: `exit`, `pwd`, `cd`, `type`, `history`
    /// - external command launcher for everything else
    pub fn new(env: Environment, out: W) -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::with_commands(
            env,
            out,
            vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Pwd>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Type>::default()),
                Box::new(Factory::<History>::default()),
                Box::new(Factory::<ExternalCommand>::default()),
            ],
        )
    }

    /// Create a new interpreter with a custom set of command factories.
    pub fn with_commands(env: Environment, out: W, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { env, commands, out }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// True once `exit` has been run.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Run one read/dispatch cycle over `line`.
    ///
    /// The line is recorded, tokenized in place and dispatched; the interrupt
    /// flag is cleared afterwards. Errors are fatal for the interpreter.
    pub fn execute_line(&mut self, line: &mut LineBuffer) -> Result<ExitCode> {
        let result = self.dispatch(line, 0);
        self.env.state.clear_interrupt();
        result
    }

    fn dispatch(&mut self, line: &mut LineBuffer, depth: usize) -> Result<ExitCode> {
        let result = self.resolve(line, depth);
        reap_zombies();
        result
    }

    fn resolve(&mut self, line: &mut LineBuffer, depth: usize) -> Result<ExitCode> {
        let state = self.env.state;
        if admits(line.as_bytes(), state.interrupt_pending()) {
            state.record(line.as_bytes());
        }

        let mut tokens = lexer::tokenize(line.as_mut_bytes());
        let background = tokens.strip_background();

        match classify(&tokens, state.interrupt_pending()) {
            Directive::Noop => Ok(0),
            Directive::RecallLast => match state.recall_last() {
                Some(recalled) => self.rerun(recalled, depth),
                None => Ok(0),
            },
            Directive::RecallNumber(digits) => {
                let recalled = parse_recall_number(digits)
                    .and_then(|n| state.recall_by_number(n).ok());
                match recalled {
                    Some(recalled) => self.rerun(recalled, depth),
                    None => self.unknown_history_command(),
                }
            }
            Directive::Command => self.run(&tokens, background),
        }
    }

    /// Echo a recalled line and run it through the whole pipeline again.
    fn rerun(&mut self, mut recalled: LineBuffer, depth: usize) -> Result<ExitCode> {
        if depth + 1 > MAX_RECALL_DEPTH {
            warn!("history recall nested deeper than {}", MAX_RECALL_DEPTH);
            return self.unknown_history_command();
        }
        self.out.write_all(recalled.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.dispatch(&mut recalled, depth + 1)
    }

    fn unknown_history_command(&mut self) -> Result<ExitCode> {
        self.out.write_all(b"Unknown history command")?;
        Ok(1)
    }

    fn run(&mut self, argv: &[&[u8]], background: bool) -> Result<ExitCode> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, argv, background) {
                let code = cmd.execute(&mut self.out, &mut self.env)?;
                debug!(
                    "{:?} exited with {}",
                    String::from_utf8_lossy(argv[0]),
                    code
                );
                return Ok(code);
            }
        }
        debug!("no command accepted {:?}", String::from_utf8_lossy(argv[0]));
        Ok(1)
    }

    fn prompt(&self) -> Vec<u8> {
        let mut prompt = working_dir_text();
        prompt.extend_from_slice(b"$ ");
        prompt
    }

    /// Read-Eval-Print Loop over raw reads of standard input.
    ///
    /// Returns once `exit` runs or input ends. A read cut short by `SIGINT`
    /// becomes an empty line for that cycle; any other read error is fatal.
    pub fn repl(&mut self, show_prompt: bool) -> Result<()> {
        self.repl_from(&mut RawStdin, show_prompt)
    }

    fn repl_from(&mut self, input: &mut dyn Read, show_prompt: bool) -> Result<()> {
        let mut reader = LineReader::new();
        let mut line = LineBuffer::new();
        while !self.env.should_exit {
            if show_prompt {
                let prompt = self.prompt();
                self.out.write_all(&prompt)?;
            }
            match reader.next_line(input, &mut line) {
                Ok(false) => {
                    debug!("end of input");
                    break;
                }
                Ok(true) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => line.clear(),
                Err(e) => return Err(e).context("unable to read command"),
            }
            self.execute_line(&mut line)?;
        }
        Ok(())
    }

    /// Read-Eval-Print Loop using the `rustyline` line editor.
    ///
    /// The editor handles `Ctrl-C` itself, so it is routed through the same
    /// code the `SIGINT` handler runs.
    pub fn repl_with_editor(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut line = LineBuffer::new();

        while !self.env.should_exit {
            let prompt = String::from_utf8_lossy(&self.prompt()).into_owned();
            match rl.readline(&prompt) {
                Ok(text) => {
                    if !text.is_empty() {
                        rl.add_history_entry(text.as_str())?;
                    }
                    line.set(text.as_bytes());
                }
                Err(ReadlineError::Interrupted) => {
                    self.env.state.on_interrupt(&mut self.out);
                    line.clear();
                }
                Err(ReadlineError::Eof) => {
                    debug!("end of input");
                    break;
                }
                Err(err) => return Err(err).context("unable to read command"),
            }
            self.execute_line(&mut line)?;
        }

        Ok(())
    }
}
