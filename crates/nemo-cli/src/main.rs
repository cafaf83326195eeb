use std::process::ExitCode;

use clap::Parser as ClapParser;
use nemo_core::{
    builtins::register_builtins, errors::ErrorKind, eval_block, heap::Heap, namespace::Scope,
    options::InterpreterOptions, parser,
};

/// The nemo interpreter: parses a script and evaluates it top to bottom.
#[derive(ClapParser)]
#[command(name = "nemo", about = "Run a nemo script", version)]
struct Cli {
    /// Script to run.
    path: String,

    /// Enable trace/debug logging of lexing, parsing and evaluation.
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = InterpreterOptions::default().with_debug(cli.debug);

    if options.debug {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("trace"))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    let ast = match parser::parse_file(&cli.path, &options) {
        Ok(ast) => ast,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    let scope = Scope::root();
    if let Err(err) = register_builtins(&scope) {
        eprintln!("{err}");
        return ExitCode::from(2);
    }

    let heap = Heap::new();
    match eval_block(&ast, &scope, &heap, &options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            match err.kind {
                ErrorKind::LexError | ErrorKind::SyntaxError => ExitCode::from(1),
                _ => ExitCode::from(2),
            }
        }
    }
}
