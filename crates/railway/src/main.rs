//! Command-line driver: `railway <path-to-source>`
//!
//! Exit 0 on successful completion of `main`, nonzero on any error with
//! a diagnostic on standard error.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "railway",
    about = "Executes Railway (.rail) source files.",
    version
)]
struct Args {
    /// Path to a Railway source file.
    source: PathBuf,

    /// Dump the parsed function table to stderr before execution.
    #[arg(long)]
    print_ast: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let source = fs::read_to_string(&args.source)
        .with_context(|| format!("failed to read {}", args.source.display()))?;

    let program = railway::parse_program(&source)
        .map_err(|err| anyhow!("{}: {}", args.source.display(), err))?;

    if args.print_ast {
        for (name, func) in &program.functions {
            eprintln!("{}: {:#?}", name, func);
        }
    }

    program.run().map_err(|err| anyhow!("{}", err))
}
