//! `bfi [--nocomments] <file> [max_steps]`: a standalone Brainfuck
//! interpreter, used as this compiler's test oracle and shipped as its
//! own tool. Exit 0 on
//! normal termination; exit 1 with a diagnostic on step-limit exceeded
//! or end-of-input on `,`.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use nbf::interpreter::{Interpreter, Program, DEFAULT_MAX_STEPS};

#[derive(Parser)]
#[command(name = "bfi", about = "Runs a Brainfuck program")]
struct Cli {
    /// Don't strip `#`-to-end-of-line comments before running.
    #[arg(long)]
    nocomments: bool,
    /// Brainfuck source file to run.
    file: PathBuf,
    /// Maximum number of instructions to execute before aborting.
    max_steps: Option<u64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("bfi: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;
    let strip_comments = !cli.nocomments;
    let program = Program::compile(&source, strip_comments).map_err(anyhow::Error::from)?;
    let max_steps = cli.max_steps.unwrap_or(DEFAULT_MAX_STEPS);
    let mut interpreter = Interpreter::with_max_steps(program, max_steps);
    interpreter
        .run(io::stdin(), io::stdout())
        .map_err(anyhow::Error::from)?;
    Ok(())
}
