//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Redact command arguments.
#[derive(Debug, Args)]
pub struct RedactCommand {
    /// Directory of recorded flows to redact
    pub source: Option<PathBuf>,

    /// Overwrite an existing redacted directory without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Number of files to redact at once
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Redact every file, not only those with the configured extension
    #[arg(short, long)]
    pub all_files: bool,
}

/// Record command arguments.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Directory to write records under
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
