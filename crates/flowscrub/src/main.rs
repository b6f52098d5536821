//! `flowscrub` - CLI for recording and redacting HTTP flows
//!
//! This binary records flows piped in as JSON lines and writes redacted
//! copies of recorded directory trees.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::mpsc;

use flowscrub::cli::{Cli, Command, ConfigCommand, RecordCommand, RedactCommand};
use flowscrub::replicate::{check_roots, prepare_target, redacted_target_for};
use flowscrub::{
    init_logging, Config, Error, FlowSource, JsonLinesSource, Recorder, Redactor, Replicator,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Validation reports on its own file, so it must not trip over a broken default
    if let Command::Config(ConfigCommand::Validate { file }) = cli.command {
        return Ok(handle_validate(file.or(cli.config)));
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Redact(redact_cmd) => handle_redact(&config, redact_cmd).await,
        Command::Record(record_cmd) => handle_record(&config, record_cmd).await,
        Command::Config(config_cmd) => {
            handle_config(&config, &config_cmd)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn handle_redact(config: &Config, cmd: RedactCommand) -> anyhow::Result<ExitCode> {
    let Some(source) = cmd.source else {
        println!("Usage: flowscrub redact <directory>");
        return Ok(ExitCode::FAILURE);
    };

    if !source.is_dir() {
        eprintln!("Error: {}", Error::SourceNotDirectory { path: source });
        return Ok(ExitCode::FAILURE);
    }

    let target = redacted_target_for(&source, &config.replicate.suffix)?;
    // Nothing may be deleted until the target is known to lie outside the source
    check_roots(&source, &target)?;
    if target.exists() && !(cmd.yes || config.replicate.overwrite) && !confirm_overwrite(&target)? {
        println!("Operation cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut options = config.replicate_options();
    if let Some(workers) = cmd.workers {
        if workers == 0 {
            bail!("--workers must be greater than 0");
        }
        options.workers = workers;
    }
    if cmd.all_files {
        options.extension = None;
    }
    let redactor = Redactor::new(config.rule_set()?);
    let replicator = Replicator::new(Arc::new(redactor), options);

    prepare_target(&target, true)
        .with_context(|| format!("failed to prepare {}", target.display()))?;
    println!("Created directory for redacted copies: {}", target.display());

    let report = if replicator.options().workers > 1 {
        replicator.replicate_concurrent(&source, &target).await?
    } else {
        replicator.replicate(&source, &target)?
    };

    println!();
    println!("Files processed: {}", report.processed);
    println!("Errors: {}", report.errors);
    println!("Redacted copies saved to: {}", target.display());
    Ok(ExitCode::SUCCESS)
}

fn confirm_overwrite(target: &Path) -> anyhow::Result<bool> {
    print!(
        "The directory {} already exists. Do you want to overwrite it? (y/n): ",
        target.display()
    );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

async fn handle_record(config: &Config, cmd: RecordCommand) -> anyhow::Result<ExitCode> {
    let data_dir = cmd.data_dir.unwrap_or_else(|| config.data_dir());
    let recorder =
        Recorder::new(&data_dir).with_max_fragment_len(config.recorder.max_fragment_len);

    let (tx, rx) = mpsc::channel(config.recorder.channel_capacity);
    let mut source = JsonLinesSource::stdin();
    source.start(tx).await?;
    let recorder_task = tokio::spawn(recorder.run(rx));

    let interrupted = tokio::select! {
        () = source.join() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        source.stop()?;
    }

    let stats = recorder_task.await.context("recorder task failed")?;
    println!(
        "Recorded {} flows to {}",
        stats.recorded,
        data_dir.display()
    );
    println!("Failed: {}", stats.failed);
    Ok(ExitCode::SUCCESS)
}

fn handle_validate(file: Option<std::path::PathBuf>) -> ExitCode {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => {
            println!("Configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Configuration error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Redaction]");
                println!(
                    "  Sensitive keys:     {}",
                    config.redaction.sensitive_keys.len()
                );
                for pattern in &config.redaction.patterns {
                    println!(
                        "  Pattern {:<10} -> {}",
                        pattern.name, pattern.replacement
                    );
                }
                println!();
                println!("[Replicate]");
                let extension = if config.replicate.extension.is_empty() {
                    "(all files)"
                } else {
                    config.replicate.extension.as_str()
                };
                println!("  Extension:          {extension}");
                println!("  Target suffix:      {}", config.replicate.suffix);
                println!("  Workers:            {}", config.replicate.workers);
                println!("  Overwrite:          {}", config.replicate.overwrite);
                println!();
                println!("[Recorder]");
                println!("  Data directory:     {}", config.data_dir().display());
                println!(
                    "  Max fragment len:   {}",
                    config.recorder.max_fragment_len
                );
                println!(
                    "  Channel capacity:   {}",
                    config.recorder.channel_capacity
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { .. } => {}
    }
    Ok(())
}
