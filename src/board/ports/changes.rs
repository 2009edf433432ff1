//! Change-notification port for row-level task events.

use crate::board::domain::{ProjectId, TaskId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A task was created.
    Insert,
    /// A task was modified.
    Update,
    /// A task was removed.
    Delete,
}

/// A row-level change to a project's task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChangeEvent {
    /// Project the task belongs to.
    pub project_id: ProjectId,
    /// Task that changed.
    pub task_id: TaskId,
    /// What happened to it.
    pub kind: ChangeKind,
}

impl TaskChangeEvent {
    /// Creates a change event.
    #[must_use]
    pub const fn new(project_id: ProjectId, task_id: TaskId, kind: ChangeKind) -> Self {
        Self {
            project_id,
            task_id,
            kind,
        }
    }
}

/// Receiving end of a project's change subscription.
pub type TaskChangeStream = broadcast::Receiver<TaskChangeEvent>;

/// Publish/subscribe channel keyed by project.
pub trait TaskChangeFeed: Send + Sync {
    /// Subscribes to task changes of one project.
    fn subscribe(&self, project_id: ProjectId) -> TaskChangeStream;
}
