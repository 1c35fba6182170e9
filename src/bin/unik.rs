use std::{io, path::PathBuf, process::ExitCode, thread};

use clap::{Parser, Subcommand};
use log::LevelFilter;

use unik::{CodeGen, Interpreter, JsonFileStore, MemoryStore, Repl, TemplateGenerator, UnikError};

/// Native stack for the evaluation thread, sized for the interpreter's
/// deepest allowed call nesting.
const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Parser)]
#[command(author, version, about = "Unik language interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// JSON file holding cached `aik` suggestions
    #[arg(long, global = true, env = "UNIK_AI_CACHE", default_value = ".unik_ai_cache.json")]
    cache: PathBuf,

    /// Keep `aik` suggestions in memory only
    #[arg(long, global = true)]
    no_cache: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Unik script file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Unik code
    Eval { source: String },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    let outcome = thread::Builder::new()
        .name("unik-eval".to_string())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(move || execute(args))
        .map_err(UnikError::from)
        .and_then(|worker| {
            worker
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("evaluation thread panicked").into()))
        });
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn execute(args: Args) -> Result<(), UnikError> {
    let codegen = if args.no_cache {
        CodeGen::new(TemplateGenerator, MemoryStore::new())
    } else {
        CodeGen::new(TemplateGenerator, JsonFileStore::open(&args.cache)?)
    };
    let mut interpreter = Interpreter::new().with_codegen(codegen);
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => {
            interpreter.load_file(script)?;
        }
        Command::Repl => Repl::new(interpreter).run()?,
        Command::Eval { source } => {
            let value = interpreter.eval_source(&source)?;
            if !value.is_nil() {
                println!("{value}");
            }
        }
    }
    Ok(())
}
