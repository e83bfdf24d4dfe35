//! Test-only helpers for constructing tasks.

use crate::task::{ACTION_SCOPE_PREFIX, Task, TaskPayload};

/// Build a task whose scopes request the given action names, in order.
pub fn task_with_actions(names: &[&str]) -> Task {
    Task {
        scopes: names
            .iter()
            .map(|name| format!("{ACTION_SCOPE_PREFIX}{name}"))
            .collect(),
        payload: TaskPayload::default(),
    }
}
