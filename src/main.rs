use argh::FromArgs;
use log::error;
use shell300::io_adapters::RawStdout;
use shell300::{DEFAULT_SHELL_NAME, Environment, Interpreter, interrupt};

#[derive(FromArgs)]
/// Interactive command interpreter with numbered history recall.
struct Args {
    #[argh(option, default = "String::from(DEFAULT_SHELL_NAME)")]
    /// name reported by `type` for commands that are not builtins.
    name: String,

    #[argh(switch)]
    /// read lines through an interactive line editor instead of raw reads.
    editor: bool,

    #[argh(switch)]
    /// do not print the working-directory prompt.
    no_prompt: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Args = argh::from_env();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    interrupt::install()?;
    let env = Environment::new(args.name, interrupt::shell_state());
    let mut sh = Interpreter::new(env, RawStdout);
    if args.editor {
        sh.repl_with_editor()
    } else {
        sh.repl(!args.no_prompt)
    }
}
