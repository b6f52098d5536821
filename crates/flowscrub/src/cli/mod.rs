//! Command-line interface for flowscrub.
//!
//! This module provides the CLI structure for the `flowscrub` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, RecordCommand, RedactCommand};

use crate::logging::Verbosity;

/// flowscrub - Record HTTP flows and scrub secrets out of them
///
/// Records intercepted HTTP exchanges as JSON files and writes redacted
/// copies of recorded trees with credentials and identifiers replaced.
#[derive(Debug, Parser)]
#[command(name = "flowscrub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a redacted copy of a directory of recorded flows
    Redact(RedactCommand),

    /// Record flows read as JSON lines from stdin
    Record(RecordCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
