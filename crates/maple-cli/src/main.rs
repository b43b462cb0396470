//! mapleopt - dataflow inspection for Maple module descriptions
//!
//! Reads a module description (the JSON/YAML form of the AST), builds its
//! control-flow graph and reports reaching definitions and def-use chains.

mod cli;
mod commands;

use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // logs go to stderr so reports on stdout stay machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> anyhow::Result<String> {
    let config = commands::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Dfa {
            input,
            function,
            format,
            jobs,
            dump_bits,
        } => commands::dfa(
            &commands::DfaArgs {
                input,
                function,
                format,
                jobs,
                dump_bits,
            },
            &config,
        ),
        Commands::Cfg { input, format } => commands::cfg(&input, format),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            if stdout.write_all(output.as_bytes()).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
