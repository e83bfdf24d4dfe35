//! Stable exit codes reported to the invoking scheduler.
//!
//! These follow the scriptworker status set, so the scheduler can classify
//! outcomes (retriable vs fatal) without parsing logs.

/// Task completed, including the empty-action-list no-op.
pub const OK: i32 = 0;
/// Generic task failure. Reserved; the worker itself never exits with this.
pub const FAILURE: i32 = 1;
/// The task requested an action this worker does not implement.
pub const MALFORMED_PAYLOAD: i32 = 3;
/// Any operational failure inside the worker (subprocess, timeout, ...).
pub const INTERNAL_ERROR: i32 = 5;
