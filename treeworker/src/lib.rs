//! Task-driven repository-mutation worker.
//!
//! Given a task descriptor whose scopes request version-control actions
//! (tagging, version bump, l10n bump, push), the worker executes them against
//! a checked-out Mercurial repository in a fixed canonical order, honoring
//! dry-run mode, and maps every failure to a stable process exit code so the
//! invoking scheduler can classify the outcome. The architecture enforces a
//! strict separation:
//!
//! - **[`task`]**: pure task model (scope resolution, the closed action set).
//! - **[`io`]**: side-effecting adapters (config, subprocess, `hg`).
//!
//! [`execute`] coordinates the two: it owns the sequencing and gating rules
//! and only reaches the real VCS through the [`io::vcs::VcsOps`] trait, so
//! tests substitute a recording fake instead of spawning processes.

pub mod error;
pub mod execute;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
