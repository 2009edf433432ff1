//! Dependency validation over a project's task set.
//!
//! Each task carries at most one `dependency_id`, so a project's dependency
//! graph is a forest of in-trees. These functions are pure so they can run
//! synchronously before any write is issued.

use super::{DependencyRejection, Task, TaskId};
use std::collections::{HashMap, HashSet};

/// Returns true when making `task_id` depend on `candidate` would create a
/// cycle, including the direct self-reference case.
#[must_use]
pub fn would_create_cycle(task_id: TaskId, candidate: TaskId, tasks: &[Task]) -> bool {
    check_dependency(task_id, candidate, tasks).is_err()
}

/// Checks whether `task_id` may depend on `candidate`.
///
/// Follows existing edges forward from `candidate`. Reaching `task_id`
/// means the new edge would close a cycle. A `task_id` that is not in
/// `tasks` cannot close one, and a reference to a task that is not in
/// `tasks` ends the walk. The visited set caps the walk at
/// `tasks.len()` steps, so pre-existing cycles in corrupted data terminate.
///
/// # Errors
///
/// Returns [`DependencyRejection::SelfReference`] when both ids match and
/// [`DependencyRejection::Cycle`] with the offending chain otherwise.
pub fn check_dependency(
    task_id: TaskId,
    candidate: TaskId,
    tasks: &[Task],
) -> Result<(), DependencyRejection> {
    if task_id == candidate {
        return Err(DependencyRejection::SelfReference(task_id));
    }
    if !tasks.iter().any(|task| task.id() == task_id) {
        return Ok(());
    }

    let edges: HashMap<TaskId, TaskId> = tasks
        .iter()
        .filter_map(|task| task.dependency_id().map(|dep| (task.id(), dep)))
        .collect();

    let mut visited = HashSet::with_capacity(tasks.len());
    let mut chain = vec![candidate];
    let mut current = candidate;
    visited.insert(candidate);

    while let Some(&next) = edges.get(&current) {
        chain.push(next);
        if next == task_id {
            return Err(DependencyRejection::Cycle {
                task_id,
                candidate,
                chain,
            });
        }
        if !visited.insert(next) {
            break;
        }
        current = next;
    }

    Ok(())
}

/// Returns the tasks `task_id` could be made to depend on.
///
/// Candidates share the task's project, are not the task itself and would
/// not create a cycle. With `hide_completed`, tasks already in
/// `completed` are left out since depending on them is trivially satisfied.
/// An unknown `task_id` yields no candidates.
#[must_use]
pub fn dependency_candidates(task_id: TaskId, tasks: &[Task], hide_completed: bool) -> Vec<&Task> {
    let Some(task) = tasks.iter().find(|task| task.id() == task_id) else {
        return Vec::new();
    };
    let project_id = task.project_id();

    tasks
        .iter()
        .filter(|candidate| candidate.project_id() == project_id)
        .filter(|candidate| !(hide_completed && candidate.status().is_completed()))
        .filter(|candidate| !would_create_cycle(task_id, candidate.id(), tasks))
        .collect()
}

/// Returns the predecessor that still holds `task` back, if any.
///
/// A dependency on a deleted task is dangling and counts as satisfied.
#[must_use]
pub fn unmet_dependency<'a>(task: &Task, tasks: &'a [Task]) -> Option<&'a Task> {
    let dependency_id = task.dependency_id()?;
    tasks
        .iter()
        .find(|candidate| candidate.id() == dependency_id)
        .filter(|dependency| !dependency.status().is_completed())
}

/// Returns true when nothing blocks `task` from being started.
#[must_use]
pub fn is_startable(task: &Task, tasks: &[Task]) -> bool {
    unmet_dependency(task, tasks).is_none()
}
