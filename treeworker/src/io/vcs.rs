//! Collaborator seam between the sequencer and the real VCS.
//!
//! The executor only talks to [`VcsOps`]; tests substitute a recording fake
//! instead of patching functions at runtime, and [`HgVcs`] is the production
//! implementation that drives `hg` with the robustcheckout extension.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::error::WorkerError;
use crate::io::actions::{apply_tags, bump_l10n, bump_version};
use crate::io::config::WorkerConfig;
use crate::io::hg::{self, Hg};
use crate::task::Task;

/// The collaborator operations the sequencer depends on.
///
/// Mutation operations return whether they changed repository state; the
/// aggregate of those booleans gates the final push.
pub trait VcsOps {
    /// Whether the checkout extension is present and functional.
    fn validate_extension(&self, config: &WorkerConfig) -> Result<bool>;

    /// Obtain the working copy for this task. Exactly one checkout per task.
    fn checkout(&self, config: &WorkerConfig) -> Result<PathBuf>;

    fn tag(&self, repo: &Path, task: &Task) -> Result<bool>;

    fn bump_version(&self, repo: &Path, task: &Task) -> Result<bool>;

    fn bump_l10n(&self, repo: &Path, task: &Task) -> Result<bool>;

    fn push(&self, config: &WorkerConfig, repo: &Path) -> Result<bool>;
}

/// Production implementation backed by the `hg` binary.
pub struct HgVcs;

impl VcsOps for HgVcs {
    fn validate_extension(&self, config: &WorkerConfig) -> Result<bool> {
        hg::validate_extension(&config.vcs_extension)
    }

    #[instrument(skip_all)]
    fn checkout(&self, config: &WorkerConfig) -> Result<PathBuf> {
        hg::log_version()?;
        fs::create_dir_all(&config.work_dir)
            .with_context(|| format!("create {}", config.work_dir.display()))?;

        if let Some(existing) = existing_checkout(&config.work_dir)? {
            debug!(dest = %existing.display(), "reusing existing checkout");
            return self.robustcheckout(config, &existing);
        }

        let dest = config.work_dir.join("src");
        self.robustcheckout(config, &dest)
    }

    fn tag(&self, repo: &Path, task: &Task) -> Result<bool> {
        let info = task
            .payload
            .tag_info
            .as_ref()
            .ok_or_else(|| anyhow!("task payload missing tag_info"))?;
        apply_tags(&Hg::new(repo), info)
    }

    fn bump_version(&self, repo: &Path, task: &Task) -> Result<bool> {
        let info = task
            .payload
            .version_bump_info
            .as_ref()
            .ok_or_else(|| anyhow!("task payload missing version_bump_info"))?;
        bump_version(&Hg::new(repo), info)
    }

    fn bump_l10n(&self, repo: &Path, task: &Task) -> Result<bool> {
        let info = task
            .payload
            .l10n_bump_info
            .as_ref()
            .ok_or_else(|| anyhow!("task payload missing l10n_bump_info"))?;
        bump_l10n(&Hg::new(repo), info)
    }

    #[instrument(skip_all)]
    fn push(&self, config: &WorkerConfig, repo: &Path) -> Result<bool> {
        let hg = Hg::new(repo);
        let timeout = Duration::from_secs(config.push_timeout_secs);
        let pushed = hg.push(timeout, config.output_limit_bytes)?;
        hg.verify_pushed(timeout, config.output_limit_bytes)?;
        Ok(pushed)
    }
}

impl HgVcs {
    /// Clone or update `dest` from the configured upstream via robustcheckout.
    ///
    /// robustcheckout is idempotent over an existing destination, which is
    /// what guarantees a fresh working copy per task without state bleed.
    fn robustcheckout(&self, config: &WorkerConfig, dest: &Path) -> Result<PathBuf> {
        if config.upstream_repo.is_empty() {
            return Err(anyhow!("upstream_repo is not configured"));
        }
        let sharebase = config.work_dir.join("share");
        let hg = Hg::new(&config.work_dir);
        hg.run_checked(&[
            "--config",
            &format!("extensions.{}=", config.vcs_extension),
            "robustcheckout",
            "--sharebase",
            &sharebase.to_string_lossy(),
            "--purge",
            "--branch",
            "default",
            &config.upstream_repo,
            &dest.to_string_lossy(),
        ])?;
        info!(dest = %dest.display(), "checkout complete");
        Ok(dest.to_path_buf())
    }
}

/// Locate the single existing checkout under `work_dir`, if any.
///
/// More than one candidate means the working directory was not reset between
/// tasks, and guessing which checkout to mutate would be unsafe.
fn existing_checkout(work_dir: &Path) -> Result<Option<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(work_dir).with_context(|| format!("list {}", work_dir.display()))? {
        let entry = entry.with_context(|| format!("list {}", work_dir.display()))?;
        let path = entry.path();
        if path.is_dir() && path.file_name().is_some_and(|name| name != "share") {
            dirs.push(path);
        }
    }
    match dirs.len() {
        0 => Ok(None),
        1 => Ok(Some(dirs.remove(0))),
        found => Err(WorkerError::UnknownResourceDir {
            parent: work_dir.to_path_buf(),
            found,
        }
        .into()),
    }
}
