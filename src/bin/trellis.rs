//! `trellis` command-line runner for compiled bytecode files.
//!
//! ```text
//! trellis run prog.tbc
//! trellis prog.tbc --dump-bytecode
//! trellis --dump-ext-builtins
//! ```
//!
//! Exit codes: 0 success, 1 compile or uncaught runtime error, 2 usage or IO
//! error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trellis::{Config, Context, ContextError, TrellisError};
use trellis_compiler::bytecode::disassemble;

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "trellis", version, about = "Run trellis bytecode")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Bytecode file to run (same as `trellis run <FILE>`).
    file: Option<PathBuf>,

    /// Print the disassembly instead of running.
    #[arg(long, global = true)]
    dump_bytecode: bool,

    /// Print the builtin inventory as category/group/function lines.
    #[arg(long, global = true)]
    dump_ext_builtins: bool,

    /// Bypass the bytecode cache.
    #[arg(long, global = true)]
    no_cache: bool,

    /// Raise the log level (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a bytecode file.
    Run { file: PathBuf },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ContextError>() {
        Some(ContextError::Trellis(TrellisError::Cache(_))) => EXIT_USAGE,
        Some(_) => EXIT_FAILURE,
        None => EXIT_USAGE,
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if cli.no_cache {
        config = config.without_cache();
    }
    let ctx = Context::with_default_modules(config)?;

    if cli.dump_ext_builtins {
        print!("{}", ctx.registry().inventory());
        if cli.file.is_none() && cli.command.is_none() {
            return Ok(());
        }
    }

    let file = match (cli.command, cli.file) {
        (Some(Command::Run { file }), _) | (None, Some(file)) => file,
        (None, None) => anyhow::bail!("no bytecode file given (try `trellis run <FILE>`)"),
    };

    let unit = ctx
        .load_bytecode(&file)
        .with_context(|| format!("cannot load {}", file.display()))?;

    if cli.dump_bytecode {
        print!("{}", disassemble(&unit));
        return Ok(());
    }

    ctx.run(Arc::new(unit))?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("trellis: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
