//! The action sequencer.
//!
//! One task in, one fixed-order mutation run out. The sequencer owns the
//! control flow and failure policy: environment validation before checkout,
//! fail-fast rejection of unknown actions before any mutation, change
//! tracking across the mutation steps, and the push gate. Nothing here is
//! retried; every failure is terminal for the current execution and the
//! scheduler re-runs the whole task if it wants a retry.
//!
//! A mutation that commits before a later step fails stays applied. There is
//! no rollback; the working copy is left as-is for the next checkout to
//! reset.

use anyhow::Result;
use tracing::{info, instrument};

use crate::error::WorkerError;
use crate::io::config::WorkerConfig;
use crate::io::vcs::VcsOps;
use crate::task::{ActionKind, CANONICAL_ORDER, Task, parse_actions, requested_actions};

/// Per-mutation change record threaded through the sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    pub tagged: bool,
    pub version_bumped: bool,
    pub l10n_bumped: bool,
}

impl MutationOutcome {
    /// Whether any mutation step reported a repository change.
    pub fn any_changed(&self) -> bool {
        self.tagged || self.version_bumped || self.l10n_bumped
    }
}

/// Summary of a completed task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Actions that actually executed, in canonical order.
    pub actions_run: Vec<ActionKind>,
    pub changes: MutationOutcome,
    pub pushed: bool,
}

impl TaskOutcome {
    fn noop() -> Self {
        Self {
            actions_run: Vec::new(),
            changes: MutationOutcome::default(),
            pushed: false,
        }
    }
}

/// Execute one task to completion or failure.
///
/// Sequence: resolve actions -> validate environment -> checkout -> validate
/// the full action set -> run requested mutations in canonical order -> push
/// if gated on. An empty (valid) action list is a no-op success and skips
/// environment validation entirely.
#[instrument(skip_all, fields(dry_run = config.dry_run))]
pub fn run_task<V: VcsOps>(config: &WorkerConfig, task: &Task, vcs: &V) -> Result<TaskOutcome> {
    let requested_names = requested_actions(task);
    if requested_names.is_empty() {
        info!("no actions requested, nothing to do");
        return Ok(TaskOutcome::noop());
    }
    info!(requested = ?requested_names, "task requested actions");

    if !vcs.validate_extension(config)? {
        return Err(WorkerError::extension_not_functional(&config.vcs_extension).into());
    }

    // Checkout collaborator failures propagate unmodified; they are outside
    // this core's taxonomy but still abort the sequence.
    let repo = vcs.checkout(config)?;

    // Validate the whole requested set before running anything, so a batch
    // containing one bad action name performs zero mutations.
    let actions = parse_actions(&requested_names)?;

    let mut changes = MutationOutcome::default();
    let mut actions_run = Vec::new();
    let mut pushed = false;

    for kind in CANONICAL_ORDER {
        if !actions.contains(&kind) {
            continue;
        }
        match kind {
            ActionKind::Tagging => {
                changes.tagged = vcs.tag(&repo, task)?;
                info!(changed = changes.tagged, "tagging finished");
                actions_run.push(kind);
            }
            ActionKind::VersionBump => {
                changes.version_bumped = vcs.bump_version(&repo, task)?;
                info!(changed = changes.version_bumped, "version bump finished");
                actions_run.push(kind);
            }
            ActionKind::L10nBump => {
                changes.l10n_bumped = vcs.bump_l10n(&repo, task)?;
                info!(changed = changes.l10n_bumped, "l10n bump finished");
                actions_run.push(kind);
            }
            ActionKind::Push => {
                if config.dry_run {
                    info!("dry run, skipping push");
                } else if !changes.any_changed() {
                    info!("no preceding changes, skipping push");
                } else {
                    pushed = vcs.push(config, &repo)?;
                    info!(pushed, "push finished");
                    actions_run.push(kind);
                }
            }
        }
    }

    Ok(TaskOutcome {
        actions_run,
        changes,
        pushed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{UnsupportedAction, exit_code_for};
    use crate::exit_codes;
    use crate::test_support::task_with_actions;
    use std::cell::{Cell, RefCell};
    use std::path::{Path, PathBuf};

    /// Recording fake: every collaborator call is appended to `calls`.
    struct FakeVcs {
        extension_ok: bool,
        tag_changed: bool,
        bump_changed: bool,
        l10n_changed: bool,
        push_succeeds: bool,
        validate_calls: Cell<usize>,
        checkout_calls: Cell<usize>,
        calls: RefCell<Vec<&'static str>>,
    }

    impl FakeVcs {
        fn new() -> Self {
            Self {
                extension_ok: true,
                tag_changed: true,
                bump_changed: true,
                l10n_changed: true,
                push_succeeds: true,
                validate_calls: Cell::new(0),
                checkout_calls: Cell::new(0),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn mutation_calls(&self) -> Vec<&'static str> {
            self.calls
                .borrow()
                .iter()
                .copied()
                .filter(|call| *call != "push")
                .collect()
        }

        fn push_calls(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|call| **call == "push")
                .count()
        }
    }

    impl VcsOps for FakeVcs {
        fn validate_extension(&self, _config: &WorkerConfig) -> Result<bool> {
            self.validate_calls.set(self.validate_calls.get() + 1);
            Ok(self.extension_ok)
        }

        fn checkout(&self, _config: &WorkerConfig) -> Result<PathBuf> {
            self.checkout_calls.set(self.checkout_calls.get() + 1);
            Ok(PathBuf::from("/work/src"))
        }

        fn tag(&self, _repo: &Path, _task: &Task) -> Result<bool> {
            self.calls.borrow_mut().push("tagging");
            Ok(self.tag_changed)
        }

        fn bump_version(&self, _repo: &Path, _task: &Task) -> Result<bool> {
            self.calls.borrow_mut().push("version_bump");
            Ok(self.bump_changed)
        }

        fn bump_l10n(&self, _repo: &Path, _task: &Task) -> Result<bool> {
            self.calls.borrow_mut().push("l10n_bump");
            Ok(self.l10n_changed)
        }

        fn push(&self, _config: &WorkerConfig, _repo: &Path) -> Result<bool> {
            self.calls.borrow_mut().push("push");
            Ok(self.push_succeeds)
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig::default()
    }

    fn dry_run_config() -> WorkerConfig {
        WorkerConfig {
            dry_run: true,
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn mutations_run_once_each_in_canonical_order() {
        // Request in scrambled order; execution order must not follow it.
        let task = task_with_actions(&["l10n_bump", "push", "tagging", "version_bump"]);
        let vcs = FakeVcs::new();

        let outcome = run_task(&config(), &task, &vcs).expect("run");
        assert_eq!(
            *vcs.calls.borrow(),
            vec!["tagging", "version_bump", "l10n_bump", "push"]
        );
        assert_eq!(
            outcome.actions_run,
            vec![
                ActionKind::Tagging,
                ActionKind::VersionBump,
                ActionKind::L10nBump,
                ActionKind::Push,
            ]
        );
    }

    #[test]
    fn push_not_called_when_not_requested() {
        let task = task_with_actions(&["tagging"]);
        let vcs = FakeVcs::new();

        let outcome = run_task(&config(), &task, &vcs).expect("run");
        assert_eq!(vcs.push_calls(), 0);
        assert!(!outcome.pushed);
        assert!(outcome.changes.tagged);
    }

    #[test]
    fn dry_run_suppresses_push_but_runs_mutations() {
        let task = task_with_actions(&["tagging", "version_bump", "l10n_bump", "push"]);
        let vcs = FakeVcs::new();

        let outcome = run_task(&dry_run_config(), &task, &vcs).expect("run");
        assert_eq!(
            vcs.mutation_calls(),
            vec!["tagging", "version_bump", "l10n_bump"]
        );
        assert_eq!(vcs.push_calls(), 0);
        assert!(!outcome.pushed);
        assert!(outcome.changes.any_changed());
    }

    #[test]
    fn push_called_once_when_changes_exist() {
        let task = task_with_actions(&["tagging", "version_bump", "l10n_bump", "push"]);
        let vcs = FakeVcs::new();

        let outcome = run_task(&config(), &task, &vcs).expect("run");
        assert_eq!(vcs.push_calls(), 1);
        assert!(outcome.pushed);
    }

    #[test]
    fn push_skipped_when_no_mutation_changed() {
        let task = task_with_actions(&["tagging", "version_bump", "l10n_bump", "push"]);
        let vcs = FakeVcs {
            tag_changed: false,
            bump_changed: false,
            l10n_changed: false,
            ..FakeVcs::new()
        };

        let outcome = run_task(&config(), &task, &vcs).expect("run");
        assert_eq!(vcs.push_calls(), 0);
        assert!(!outcome.pushed);
    }

    #[test]
    fn push_alone_has_no_change_signal_and_is_skipped() {
        let task = task_with_actions(&["push"]);
        let vcs = FakeVcs::new();

        let outcome = run_task(&config(), &task, &vcs).expect("run");
        assert_eq!(vcs.push_calls(), 0);
        assert!(outcome.actions_run.is_empty());
        assert!(!outcome.pushed);
    }

    #[test]
    fn unknown_action_fails_before_any_mutation() {
        let task = task_with_actions(&["tagging", "funsize", "push"]);
        let vcs = FakeVcs::new();

        let err = run_task(&config(), &task, &vcs).expect_err("should fail");
        let unsupported = err
            .downcast_ref::<UnsupportedAction>()
            .expect("typed unsupported error");
        assert_eq!(unsupported.0, "funsize");
        assert!(vcs.calls.borrow().is_empty());
        assert_eq!(exit_code_for(&err), exit_codes::MALFORMED_PAYLOAD);
    }

    #[test]
    fn broken_extension_fails_before_checkout() {
        let task = task_with_actions(&["tagging"]);
        let vcs = FakeVcs {
            extension_ok: false,
            ..FakeVcs::new()
        };

        let err = run_task(&config(), &task, &vcs).expect_err("should fail");
        assert!(err.downcast_ref::<WorkerError>().is_some());
        assert_eq!(vcs.checkout_calls.get(), 0);
        assert!(vcs.calls.borrow().is_empty());
        assert_eq!(exit_code_for(&err), exit_codes::INTERNAL_ERROR);
    }

    #[test]
    fn empty_action_list_is_noop_without_env_validation() {
        let task = task_with_actions(&[]);
        let vcs = FakeVcs {
            // Even a broken extension must not matter for an empty list.
            extension_ok: false,
            ..FakeVcs::new()
        };

        let outcome = run_task(&config(), &task, &vcs).expect("run");
        assert_eq!(outcome, TaskOutcome::noop());
        assert_eq!(vcs.validate_calls.get(), 0);
        assert_eq!(vcs.checkout_calls.get(), 0);
    }

    #[test]
    fn checkout_happens_exactly_once_per_task() {
        let task = task_with_actions(&["tagging", "version_bump", "l10n_bump", "push"]);
        let vcs = FakeVcs::new();

        run_task(&config(), &task, &vcs).expect("run");
        assert_eq!(vcs.validate_calls.get(), 1);
        assert_eq!(vcs.checkout_calls.get(), 1);
    }

    #[test]
    fn dry_run_is_idempotent_for_push() {
        let task = task_with_actions(&["tagging", "version_bump", "l10n_bump", "push"]);
        let vcs = FakeVcs::new();

        run_task(&dry_run_config(), &task, &vcs).expect("first run");
        run_task(&dry_run_config(), &task, &vcs).expect("second run");
        assert_eq!(vcs.push_calls(), 0);
    }

    #[test]
    fn mutation_failure_aborts_sequence_without_later_steps() {
        struct FailingBump(FakeVcs);
        impl VcsOps for FailingBump {
            fn validate_extension(&self, config: &WorkerConfig) -> Result<bool> {
                self.0.validate_extension(config)
            }
            fn checkout(&self, config: &WorkerConfig) -> Result<PathBuf> {
                self.0.checkout(config)
            }
            fn tag(&self, repo: &Path, task: &Task) -> Result<bool> {
                self.0.tag(repo, task)
            }
            fn bump_version(&self, _repo: &Path, _task: &Task) -> Result<bool> {
                Err(WorkerError::Subprocess("hg commit failed".to_string()).into())
            }
            fn bump_l10n(&self, repo: &Path, task: &Task) -> Result<bool> {
                self.0.bump_l10n(repo, task)
            }
            fn push(&self, config: &WorkerConfig, repo: &Path) -> Result<bool> {
                self.0.push(config, repo)
            }
        }

        let task = task_with_actions(&["tagging", "version_bump", "l10n_bump", "push"]);
        let vcs = FailingBump(FakeVcs::new());

        let err = run_task(&config(), &task, &vcs).expect_err("should fail");
        assert_eq!(exit_code_for(&err), exit_codes::INTERNAL_ERROR);
        // Tagging ran (and stays applied, no rollback); nothing after the
        // failing step was attempted.
        assert_eq!(*vcs.0.calls.borrow(), vec!["tagging"]);
    }
}
