//! CLI argument parsing and command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mapleopt")]
#[command(version, about = "Reaching-definitions and def-use analysis over module descriptions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (debug-level logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// YAML file with dataflow settings
    #[arg(short, long, global = true, value_name = "CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute def-use chains for every function of the input modules
    Dfa {
        /// Module descriptions (.json, .yaml or .yml)
        #[arg(value_name = "INPUT", required = true)]
        input: Vec<PathBuf>,

        /// Only analyse functions with this name (`<module>` for top-level code)
        #[arg(long, value_name = "NAME")]
        function: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Worker threads for per-function analysis (defaults to all cores)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Also print per-block Prsv, Gen and RchIn vectors (text output only)
        #[arg(long)]
        dump_bits: bool,
    },

    /// Print the control-flow graph of a module
    Cfg {
        /// Module description (.json, .yaml or .yml)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}
