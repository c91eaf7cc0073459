//! # chainseal CLI
//!
//! Recomputes the checksum chain of an activation package and reports
//! whether it is consistent.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chainseal_chain::{Mode, Pipeline, PipelineOptions};
use chainseal_config::logging::{init_logging, LogLevel};
use chainseal_config::path::normalize_or_original;
use chainseal_config::{log_cli_debug, BackupPolicy, ChainConfig};
use clap::{Parser, Subcommand};
use console::style;

mod render;

/// Keep an activation package's checksum chain consistent
#[derive(Parser)]
#[command(name = "chainseal")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Package root containing Data/ and Meta/ (default: current directory)
    #[arg(long, global = true, env = "CHAINSEAL_ROOT", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Extra config file layered over the global and package configs
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not snapshot manifests before rewriting them
    #[arg(long, global = true, conflicts_with = "backup_policy")]
    no_backup: bool,

    /// Backup policy: off, warn or require
    #[arg(long, global = true, value_name = "POLICY")]
    backup_policy: Option<String>,

    /// Print only the final verdict
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Update both links, then verify (default)
    Run,

    /// Update both links without verifying
    Update,

    /// Verify both links without changing anything
    Verify,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// List the config files that are consulted, in load order
    Path,
}

fn main() {
    init_logging(LogLevel::Warn);

    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:?}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let root = match &cli.root {
        Some(root) => normalize_or_original(root),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    if let Some(explicit) = &cli.config {
        if !explicit.is_file() {
            bail!("config file not found: {}", explicit.display());
        }
    }

    let mut config = ChainConfig::load(&root, cli.config.as_deref())
        .with_context(|| format!("failed to load configuration for {}", root.display()))?;

    let mut options = PipelineOptions::default();
    if let Some(policy) = &cli.backup_policy {
        let policy: BackupPolicy = policy.parse()?;
        config.backup.policy = policy;
        options.backup_policy = Some(policy);
    }
    if cli.no_backup {
        config.backup.policy = BackupPolicy::Off;
        options = PipelineOptions::without_backups();
    }

    let mode = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => Mode::Full,
        Commands::Update => Mode::UpdateOnly,
        Commands::Verify => Mode::VerifyOnly,
        Commands::Config { command } => {
            return cmd_config(command, &root, &config, cli.config.as_deref());
        }
    };

    log_cli_debug!(
        "starting",
        mode = tracing::field::display(mode),
        root = tracing::field::display(root.display()),
        policy = tracing::field::display(config.backup.policy)
    );
    let report = Pipeline::new(config, options).run(mode);
    render::render(&report, &root, cli.quiet);
    Ok(report.exit_code())
}

fn cmd_config(
    command: ConfigCommands,
    root: &Path,
    config: &ChainConfig,
    explicit: Option<&Path>,
) -> Result<i32> {
    match command {
        ConfigCommands::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Path => {
            let global = ChainConfig::global_config_path();
            let project = ChainConfig::project_config_path(root);
            let layers = [
                ("global", global.as_deref()),
                ("package", Some(project.as_path())),
                ("explicit", explicit),
            ];
            for (label, path) in layers {
                match path {
                    Some(path) => {
                        let state = if path.exists() { "" } else { " (not found)" };
                        println!("{}: {}{}", label, path.display(), state);
                    }
                    None => println!("{}: (none)", label),
                }
            }
        }
    }
    Ok(0)
}
