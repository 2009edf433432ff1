//! Error types for board domain operations.

use super::{TaskId, TaskStatus};
use std::time::Duration;
use thiserror::Error;

/// Error returned while parsing task statuses strictly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Errors returned by status partition operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PartitionError {
    /// The task is not listed in the column it was expected in.
    #[error("task {task_id} is not in the {status} column")]
    TaskNotInColumn {
        /// Task that was looked up.
        task_id: TaskId,
        /// Column that was searched.
        status: TaskStatus,
    },

    /// A reorder index lies outside the column.
    #[error("index {index} is out of range for the {status} column of length {len}")]
    IndexOutOfRange {
        /// Column being reordered.
        status: TaskStatus,
        /// Offending index.
        index: usize,
        /// Column length.
        len: usize,
    },

    /// The partition does not list every source task exactly once.
    #[error(
        "partition membership mismatch: missing {missing:?}, duplicated {duplicated:?}, unexpected {unexpected:?}"
    )]
    MembershipMismatch {
        /// Source tasks absent from every column.
        missing: Vec<TaskId>,
        /// Tasks listed more than once.
        duplicated: Vec<TaskId>,
        /// Listed tasks absent from the source collection.
        unexpected: Vec<TaskId>,
    },
}

/// Errors returned by the drag session state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DragError {
    /// A hover or drop arrived while no card was picked up.
    #[error("no drag session is active")]
    NotDragging,

    /// The picked-up or hovered card is not on the board.
    #[error("task {0} is not on the board")]
    UnknownTask(TaskId),

    /// Live-preview reordering failed.
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// Errors returned when starting an optimistic move.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoveError {
    /// Source and target status are the same.
    #[error("task {task_id} is already in the {status} column")]
    NoStatusChange {
        /// Task that was moved.
        task_id: TaskId,
        /// Status it already holds.
        status: TaskStatus,
    },

    /// The task is not on the board.
    #[error("task {0} is not on the board")]
    UnknownTask(TaskId),

    /// The partition rejected the move.
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// Reason a dependency assignment was refused before reaching the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DependencyRejection {
    /// A task may not depend on itself.
    #[error("task {0} cannot depend on itself")]
    SelfReference(TaskId),

    /// The candidate already depends, transitively, on the task.
    #[error(
        "task {task_id} cannot depend on {candidate}: the chain {} leads back to it",
        format_chain(.chain)
    )]
    Cycle {
        /// Task receiving the dependency.
        task_id: TaskId,
        /// Proposed predecessor.
        candidate: TaskId,
        /// Existing chain from the candidate back to the task.
        chain: Vec<TaskId>,
    },
}

fn format_chain(chain: &[TaskId]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Outcome of a backend status write that did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceFailure {
    /// The data service refused or failed the write.
    #[error("status update rejected: {0}")]
    Rejected(String),

    /// No answer arrived before the configured timeout.
    #[error("status update timed out after {0:?}")]
    TimedOut(Duration),
}
