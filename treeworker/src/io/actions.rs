//! Mutation bodies for the three repository actions.
//!
//! Each body reports whether it changed repository state; the sequencer uses
//! the aggregate of those reports to gate the final push. File rewrites are
//! split into pure helpers so the interesting logic is testable without a
//! working copy.

use std::fs;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, info, instrument};

use crate::io::hg::Hg;
use crate::task::{L10nBumpInfo, TagInfo, VersionBumpInfo};

/// Accepted version strings: release, beta (`109.0b3`), and esr (`102.6.0esr`).
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+(\.\d+)*((a|b|rc)\d+)?(esr)?$").expect("valid version regex")
});

/// Apply the task's tags to the requested revision.
#[instrument(skip_all)]
pub fn apply_tags(hg: &Hg, info: &TagInfo) -> Result<bool> {
    if info.tags.is_empty() {
        debug!("no tags requested");
        return Ok(false);
    }
    let message = format!(
        "No bug - tagging {} with {} a=release CLOSED TREE",
        info.revision,
        info.tags.join(", ")
    );
    hg.tag(&info.revision, &info.tags, &message)?;
    info!(revision = %info.revision, tags = ?info.tags, "tagged");
    Ok(true)
}

/// Rewrite the task's version files and commit the result.
#[instrument(skip_all, fields(next_version = %info.next_version))]
pub fn bump_version(hg: &Hg, info: &VersionBumpInfo) -> Result<bool> {
    if !VERSION_RE.is_match(&info.next_version) {
        return Err(anyhow!("invalid next_version '{}'", info.next_version));
    }

    let mut touched = 0usize;
    for file in &info.files {
        let path = hg.workdir().join(file);
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        match replace_version(&contents, &info.next_version) {
            Some(updated) => {
                fs::write(&path, updated).with_context(|| format!("write {}", path.display()))?;
                touched += 1;
            }
            None => debug!(file = %file, "version already current"),
        }
    }
    if touched == 0 {
        debug!("no version files needed changes");
        return Ok(false);
    }

    let message = format!(
        "No bug - Bumping version to {} a=release CLOSED TREE",
        info.next_version
    );
    let committed = hg.commit(&message)?;
    info!(files = touched, committed, "version bump finished");
    Ok(committed)
}

/// Pin the task's locale revisions in the changesets file and commit.
#[instrument(skip_all, fields(path = %info.path))]
pub fn bump_l10n(hg: &Hg, info: &L10nBumpInfo) -> Result<bool> {
    let path = hg.workdir().join(&info.path);
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let changesets: serde_json::Value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;

    let Some(updated) = merge_revisions(&changesets, info)? else {
        debug!("locale revisions already current");
        return Ok(false);
    };
    fs::write(&path, updated).with_context(|| format!("write {}", path.display()))?;

    let message = format!("No bug - Bumping {} a=l10n-bump CLOSED TREE", info.path);
    let committed = hg.commit(&message)?;
    info!(locales = info.revisions.len(), committed, "l10n bump finished");
    Ok(committed)
}

/// Replace the version in a single-value version file.
///
/// The file holds one version string on its first non-comment line; trailing
/// content is preserved. Returns None when the file already carries
/// `next_version`.
fn replace_version(contents: &str, next_version: &str) -> Option<String> {
    let mut lines: Vec<&str> = contents.lines().collect();
    let idx = lines
        .iter()
        .position(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))?;
    if lines[idx].trim() == next_version {
        return None;
    }
    lines[idx] = next_version;
    let mut updated = lines.join("\n");
    if contents.ends_with('\n') {
        updated.push('\n');
    }
    Some(updated)
}

/// Merge pinned locale revisions into the changesets JSON.
///
/// Returns the rewritten file contents, or None if every locale already
/// points at its pinned revision. Locales absent from the file are added.
fn merge_revisions(changesets: &serde_json::Value, info: &L10nBumpInfo) -> Result<Option<String>> {
    let mut updated = changesets.clone();
    let map = updated
        .as_object_mut()
        .ok_or_else(|| anyhow!("{} is not a JSON object", info.path))?;

    let mut changed = false;
    for (locale, revision) in &info.revisions {
        let entry = map
            .entry(locale.clone())
            .or_insert_with(|| serde_json::json!({}));
        let obj = entry
            .as_object_mut()
            .ok_or_else(|| anyhow!("locale '{locale}' entry is not a JSON object"))?;
        let current = obj.get("revision").and_then(|v| v.as_str());
        if current != Some(revision.as_str()) {
            obj.insert(
                "revision".to_string(),
                serde_json::Value::String(revision.clone()),
            );
            changed = true;
        }
    }

    if !changed {
        return Ok(None);
    }
    let mut buf = serde_json::to_string_pretty(&updated).context("serialize changesets")?;
    buf.push('\n');
    Ok(Some(buf))
}
