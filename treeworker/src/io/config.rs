//! Worker configuration (TOML).
//!
//! The config is immutable for the duration of one task execution and is
//! re-derived from disk for each task, so no state bleeds across tasks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// Operational parameters for one task execution.
///
/// Missing fields fall back to deployment defaults; an absent file means
/// "all defaults".
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Where checkouts live. One repository checkout per task.
    pub work_dir: PathBuf,

    /// Where task artifacts are collected by the surrounding process manager.
    pub artifact_dir: PathBuf,

    /// Perform every mutation locally but never push.
    pub dry_run: bool,

    /// VCS extension required for checkouts.
    pub vcs_extension: String,

    /// Clone source for the repository this worker mutates.
    pub upstream_repo: String,

    /// Wall-clock bound for network-facing `hg` commands (push, outgoing).
    pub push_timeout_secs: u64,

    /// Truncate captured subprocess output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let base = default_base_dir();
        Self {
            work_dir: base.join("work_dir"),
            artifact_dir: base.join("artifact_dir"),
            dry_run: false,
            vcs_extension: "robustcheckout".to_string(),
            upstream_repo: String::new(),
            push_timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

/// Parent of the current directory.
///
/// The worker runs inside a per-task subdirectory, so its working directories
/// default to siblings of that subdirectory.
fn default_base_dir() -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| cwd.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(anyhow!("work_dir must not be empty"));
        }
        if self.vcs_extension.trim().is_empty() {
            return Err(anyhow!("vcs_extension must not be empty"));
        }
        if self.push_timeout_secs == 0 {
            return Err(anyhow!("push_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WorkerConfig::default()`.
pub fn load_config(path: &Path) -> Result<WorkerConfig> {
    if !path.exists() {
        let cfg = WorkerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WorkerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
