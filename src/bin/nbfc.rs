//! `nbfc <input-file> <output-file>`: compiles NBF source to Brainfuck
//! text. Exit 0 on success, 1 on any I/O or
//! compilation error, with the error printed to stderr.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "nbfc", about = "Compiles NBF source into Brainfuck")]
struct Cli {
    /// NBF source file to compile.
    input: PathBuf,
    /// Where to write the emitted Brainfuck source.
    output: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("nbfc: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let code = nbf::compile_source(&source).map_err(anyhow::Error::from)?;
    fs::write(&cli.output, code)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    Ok(())
}
