//! Mercurial adapter.
//!
//! The worker never touches the working copy directly; every mutation goes
//! through a small, explicit wrapper around `hg` subprocess calls so failures
//! surface as the typed subprocess error.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::error::WorkerError;
use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Wrapper for executing `hg` commands in a working copy.
#[derive(Debug, Clone)]
pub struct Hg {
    workdir: PathBuf,
}

impl Hg {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Apply tags to a revision as a new commit on top of the working copy.
    #[instrument(skip_all, fields(revision, tag_count = tags.len()))]
    pub fn tag(&self, revision: &str, tags: &[String], message: &str) -> Result<()> {
        debug!(revision, ?tags, "tagging revision");
        let args = tag_args(revision, tags, message);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_checked(&arg_refs)?;
        Ok(())
    }

    /// True if tracked files were modified, added, removed, or deleted.
    pub fn has_changes(&self) -> Result<bool> {
        let out = self.run_capture(&["status", "-mard"])?;
        Ok(!out.trim().is_empty())
    }

    /// Commit outstanding changes to tracked files.
    ///
    /// If the working copy is unchanged, returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit(&self, message: &str) -> Result<bool> {
        if !self.has_changes()? {
            debug!("working copy unchanged, skipping commit");
            return Ok(false);
        }
        debug!("committing working copy changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Push the working copy's head upstream, bounded by `timeout`.
    ///
    /// Returns whether anything was actually pushed; `hg push` reports
    /// "nothing to push" through exit status 1, which is not a failure.
    #[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
    pub fn push(&self, timeout: Duration, output_limit_bytes: usize) -> Result<bool> {
        let out = self.run_bounded(&["push", "-r", "."], timeout, output_limit_bytes)?;
        classify_push_status(
            out.status.code(),
            String::from_utf8_lossy(&out.stderr).trim(),
        )
    }

    /// Verify nothing is left outgoing after a push.
    #[instrument(skip_all)]
    pub fn verify_pushed(&self, timeout: Duration, output_limit_bytes: usize) -> Result<()> {
        let out = self.run_bounded(&["outgoing", "-r", "."], timeout, output_limit_bytes)?;
        classify_outgoing_status(out.status.code())
    }

    fn run_bounded(
        &self,
        args: &[&str],
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new("hg");
        cmd.args(args).current_dir(&self.workdir);
        let out = run_command_with_timeout(cmd, timeout, output_limit_bytes)?;
        enforce_deadline(out.timed_out, &format!("hg {}", args.join(" ")), timeout)?;
        Ok(out)
    }

    pub(crate) fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub(crate) fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::Subprocess(format!(
                "hg {} failed: {}",
                args.join(" "),
                stderr.trim()
            ))
            .into());
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("hg")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|err| {
                WorkerError::Subprocess(format!("spawn hg {}: {err}", args.join(" "))).into()
            })
    }
}

/// Map `hg push` exit status to "did anything get pushed".
///
/// Status 1 is `hg`'s "nothing to push", a normal outcome; anything beyond
/// {0, 1} is a subprocess failure.
fn classify_push_status(status: Option<i32>, stderr: &str) -> Result<bool> {
    match status {
        Some(0) => Ok(true),
        Some(1) => {
            debug!("nothing to push");
            Ok(false)
        }
        code => Err(WorkerError::Subprocess(format!("hg push exited {code:?}: {stderr}")).into()),
    }
}

/// Map `hg outgoing` exit status to a post-push verification outcome.
///
/// `hg outgoing` exits 0 when changesets remain unpushed and 1 when the
/// upstream has everything; any other status means the verification itself
/// misbehaved.
fn classify_outgoing_status(status: Option<i32>) -> Result<()> {
    match status {
        Some(1) => Ok(()),
        Some(0) => {
            warn!("changesets still outgoing after push");
            Err(anyhow!("push did not reach the upstream"))
        }
        status => Err(WorkerError::InvalidExternalStatus {
            command: "hg outgoing".to_string(),
            status,
        }
        .into()),
    }
}

/// Surface a deadline hit as the typed timeout error.
fn enforce_deadline(timed_out: bool, operation: &str, waited: Duration) -> Result<()> {
    if timed_out {
        return Err(WorkerError::Timeout {
            operation: operation.to_string(),
            waited,
        }
        .into());
    }
    Ok(())
}

fn tag_args(revision: &str, tags: &[String], message: &str) -> Vec<String> {
    let mut args = vec![
        "tag".to_string(),
        "-r".to_string(),
        revision.to_string(),
        "-m".to_string(),
        message.to_string(),
    ];
    args.extend(tags.iter().cloned());
    args
}

/// Check that the checkout extension is present and functional.
///
/// "Not functional" is a normal `false` outcome; the caller decides whether
/// absence is fatal. Only a failure to invoke `hg` at all is an error.
#[instrument(skip_all, fields(extension))]
pub fn validate_extension(extension: &str) -> Result<bool> {
    let output = Command::new("hg")
        .arg("--config")
        .arg(format!("extensions.{extension}="))
        .arg(extension)
        .arg("-q")
        .arg("--help")
        .output()
        .map_err(|err| WorkerError::Subprocess(format!("spawn hg {extension} --help: {err}")))?;
    let functional = output.status.success();
    debug!(extension, functional, "extension check finished");
    Ok(functional)
}

/// Log the `hg` version at debug level. Failures here are fatal: a worker
/// that cannot run `hg version` cannot run anything else either.
pub fn log_version() -> Result<()> {
    let output = Command::new("hg")
        .args(["version", "-q"])
        .output()
        .map_err(|err| WorkerError::Subprocess(format!("spawn hg version: {err}")))?;
    if !output.status.success() {
        return Err(WorkerError::Subprocess("hg version failed".to_string()).into());
    }
    let version = String::from_utf8_lossy(&output.stdout);
    debug!(version = %version.trim(), "hg version");
    Ok(())
}
