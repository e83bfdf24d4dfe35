//! Task descriptor and action resolution.
//!
//! A task arrives as trusted JSON from the scheduler. Its scopes encode which
//! repository actions the worker is authorized (and expected) to run; its
//! payload carries the per-action inputs.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::UnsupportedAction;

/// Scope prefix that encodes requested actions on a task.
pub const ACTION_SCOPE_PREFIX: &str = "project:vcs:treeworker:action:";

/// Task descriptor, immutable once parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub payload: TaskPayload,
}

/// Per-action inputs. Each action requires its own section to be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskPayload {
    pub tag_info: Option<TagInfo>,
    pub version_bump_info: Option<VersionBumpInfo>,
    pub l10n_bump_info: Option<L10nBumpInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagInfo {
    /// Revision the tags point at.
    pub revision: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionBumpInfo {
    /// Version files to rewrite, relative to the repository root.
    pub files: Vec<String>,
    pub next_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct L10nBumpInfo {
    /// Locale changesets file, relative to the repository root.
    pub path: String,
    /// Locale -> pinned revision.
    pub revisions: std::collections::BTreeMap<String, String>,
}

/// One repository-mutation step.
///
/// The set is closed: anything a task requests outside it is rejected as
/// [`UnsupportedAction`] before any mutation runs. Execution order is fixed
/// by [`CANONICAL_ORDER`], never by the order actions were requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    Tagging,
    VersionBump,
    L10nBump,
    Push,
}

/// Fixed execution order: tag first, bumps next, push last.
pub const CANONICAL_ORDER: [ActionKind; 4] = [
    ActionKind::Tagging,
    ActionKind::VersionBump,
    ActionKind::L10nBump,
    ActionKind::Push,
];

impl ActionKind {
    pub fn parse(name: &str) -> Result<Self, UnsupportedAction> {
        match name {
            "tagging" => Ok(Self::Tagging),
            "version_bump" => Ok(Self::VersionBump),
            "l10n_bump" => Ok(Self::L10nBump),
            "push" => Ok(Self::Push),
            other => Err(UnsupportedAction(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tagging => "tagging",
            Self::VersionBump => "version_bump",
            Self::L10nBump => "l10n_bump",
            Self::Push => "push",
        }
    }
}

/// De-duplicated action names requested by the task's scopes.
///
/// Unrecognized names are kept: rejecting them is the executor's job, so that
/// "nothing requested" (a no-op success) and "something unknown requested"
/// (a hard failure) stay distinguishable.
pub fn requested_actions(task: &Task) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();
    for scope in &task.scopes {
        if let Some(name) = scope.strip_prefix(ACTION_SCOPE_PREFIX)
            && seen.insert(name.to_string())
        {
            names.push(name.to_string());
        }
    }
    names
}

/// Validate the full requested set up front.
///
/// Fails on the first unknown name so that a batch containing one bad action
/// never performs a partial mutation.
pub fn parse_actions(names: &[String]) -> Result<BTreeSet<ActionKind>, UnsupportedAction> {
    names.iter().map(|name| ActionKind::parse(name)).collect()
}

/// Load a task descriptor from a JSON file.
pub fn load_task(path: &Path) -> Result<Task> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let task: Task =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(task)
}
