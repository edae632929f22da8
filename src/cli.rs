//! Command line interface built on clap.
//!
//! [`Cli`] carries the subcommands ([`Command`]: run, check) and the global
//! flags (--config, --tick-ms, --verbose, --log-format).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// contentpipe: runs content pipelines defined in TOML or JSON files.
#[derive(Debug, Parser)]
#[command(name = "contentpipe", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file to use instead of `contentpipe.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Runner tick interval in milliseconds. Overrides the config file.
    #[arg(long, global = true)]
    pub tick_ms: Option<u64>,

    /// More log output; repeat for more detail.
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs every pipeline in a pipeline file.
    Run {
        /// Pipeline file (`.toml` or `.json`).
        file: PathBuf,

        /// Print a JSON report for each finished pipeline.
        #[arg(long)]
        report: bool,
    },

    /// Validates a pipeline file and prints its stages without running it.
    Check {
        /// Pipeline file (`.toml` or `.json`).
        file: PathBuf,
    },
}

impl Cli {
    /// Default `tracing` filter directive for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
