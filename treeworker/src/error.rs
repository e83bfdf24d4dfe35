//! Typed failures for the worker, each carrying a fixed exit code.
//!
//! Errors propagate as `anyhow::Error` through the executor chain and are
//! only converted to an exit status at the process boundary (`main`), via
//! [`exit_code_for`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::exit_codes;

/// Operational failures raised anywhere in the executor chain.
///
/// All variants share the internal-error exit code: the scheduler treats them
/// uniformly and retries by re-running the whole task. The kind is only
/// distinguishable through logs.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The VCS binary exited non-zero or could not be invoked.
    #[error("subprocess failed: {0}")]
    Subprocess(String),

    /// A required directory could not be uniquely located.
    #[error("expected exactly one directory under {parent} (found {found})")]
    UnknownResourceDir { parent: PathBuf, found: usize },

    /// An external verification step returned a status outside the expected set.
    #[error("invalid status {status:?} from `{command}`")]
    InvalidExternalStatus {
        command: String,
        status: Option<i32>,
    },

    /// A bounded wait exceeded its deadline.
    #[error("timed out after {waited:?}: {operation}")]
    Timeout { operation: String, waited: Duration },
}

impl WorkerError {
    pub fn exit_code(&self) -> i32 {
        exit_codes::INTERNAL_ERROR
    }

    /// The required checkout extension failed its functional check.
    pub fn extension_not_functional(extension: &str) -> Self {
        Self::Subprocess(format!("vcs extension '{extension}' is not functional"))
    }
}

/// The task requested an action this worker does not implement.
///
/// Deliberately not a [`WorkerError`] variant: it indicates a scheduler/worker
/// contract mismatch, not an operational condition, so it carries the
/// malformed-payload exit code and the scheduler must not retry it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported action '{0}'")]
pub struct UnsupportedAction(pub String);

impl UnsupportedAction {
    pub fn exit_code(&self) -> i32 {
        exit_codes::MALFORMED_PAYLOAD
    }
}

/// Map a propagated error to the process exit status.
///
/// Errors raised by collaborators outside the taxonomy (checkout plumbing,
/// task parsing) fall through to internal-error.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(unsupported) = err.downcast_ref::<UnsupportedAction>() {
        return unsupported.exit_code();
    }
    if let Some(worker) = err.downcast_ref::<WorkerError>() {
        return worker.exit_code();
    }
    exit_codes::INTERNAL_ERROR
}
