//! Task-driven repository-mutation worker CLI.
//!
//! The process boundary: loads config and task, runs the executor, and
//! translates any raised error into the process exit status via the error's
//! carried code. This is the only place errors become exit codes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use treeworker::error::{WorkerError, exit_code_for};
use treeworker::execute::run_task;
use treeworker::io::config::{WorkerConfig, load_config};
use treeworker::io::vcs::{HgVcs, VcsOps};
use treeworker::logging;
use treeworker::task::load_task;

#[derive(Parser)]
#[command(
    name = "treeworker",
    version,
    about = "Task-driven repository-mutation worker"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the actions a task requests against the upstream repository.
    Run {
        /// Worker config TOML. Defaults apply when omitted or missing.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Task descriptor JSON.
        #[arg(long)]
        task: PathBuf,
    },
    /// Check that the required VCS extension is functional.
    CheckEnv {
        /// Worker config TOML. Defaults apply when omitted or missing.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(exit_code_for(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { config, task } => cmd_run(config.as_deref(), &task),
        Command::CheckEnv { config } => cmd_check_env(config.as_deref()),
    }
}

fn cmd_run(config_path: Option<&Path>, task_path: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let task = load_task(task_path)?;

    let outcome = run_task(&config, &task, &HgVcs)?;
    info!(
        actions = ?outcome.actions_run,
        changed = outcome.changes.any_changed(),
        pushed = outcome.pushed,
        "task complete"
    );
    let names: Vec<&str> = outcome
        .actions_run
        .iter()
        .map(|kind| kind.name())
        .collect();
    println!(
        "actions={} changed={} pushed={}",
        names.join(","),
        outcome.changes.any_changed(),
        outcome.pushed
    );
    Ok(())
}

fn cmd_check_env(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let functional = HgVcs.validate_extension(&config)?;
    println!(
        "{} {}",
        config.vcs_extension,
        if functional {
            "functional"
        } else {
            "not functional"
        }
    );
    if !functional {
        return Err(WorkerError::extension_not_functional(&config.vcs_extension).into());
    }
    Ok(())
}

fn resolve_config(path: Option<&Path>) -> Result<WorkerConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            let cfg = WorkerConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}
