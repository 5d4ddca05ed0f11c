use std::{fs, io, path::PathBuf, process::ExitCode};

use clap::Parser;
use nickel::{interpreter::interpret, parser::parse_program, result::Result};
use nickel_llvm::executor::{Executor, ExecutorConfig};

#[derive(Parser)]
#[command(version, about = "Run nickel programs", long_about = None)]
struct Cli {
    /// Compile to native code and run it, instead of interpreting
    #[arg(long, default_value_t = false)]
    jit: bool,

    /// Program to run. Read from standard input if absent
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,
}

fn run(cli: Cli) -> Result<()> {
    let src = match &cli.input {
        Some(path) => fs::read_to_string(path)?,
        None => io::read_to_string(io::stdin())?,
    };
    let program = parse_program(&src)?;

    if cli.jit {
        Executor::new(ExecutorConfig::from_env()).run(&program)
    } else {
        interpret(&program).map(|value| log::debug!("main evaluated to {value}"))
    }
}

pub fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if let Some(backtrace) = err.captured_backtrace() {
                log::debug!("{backtrace}");
            }
            ExitCode::FAILURE
        }
    }
}
