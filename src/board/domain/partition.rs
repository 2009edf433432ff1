//! Status partition: the kanban columns derived from a task list.

use super::{PartitionError, Task, TaskId, TaskStatus};
use std::collections::{BTreeMap, BTreeSet};

/// Tasks grouped by status into ordered columns.
///
/// Every status in [`TaskStatus::ALL`] has a column, possibly empty.
/// Operations return new partitions and leave the receiver untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPartition {
    columns: BTreeMap<TaskStatus, Vec<Task>>,
}

impl Default for StatusPartition {
    fn default() -> Self {
        Self {
            columns: TaskStatus::ALL
                .iter()
                .map(|status| (*status, Vec::new()))
                .collect(),
        }
    }
}

impl StatusPartition {
    /// Groups `tasks` by status, preserving input order within each column.
    #[must_use]
    pub fn derive(tasks: &[Task]) -> Self {
        let mut partition = Self::default();
        for task in tasks {
            partition.column_mut(task.status()).push(task.clone());
        }
        partition
    }

    /// Returns the tasks in one column.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> &[Task] {
        self.columns.get(&status).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over columns in board order.
    pub fn columns(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        self.columns
            .iter()
            .map(|(status, tasks)| (*status, tasks.as_slice()))
    }

    /// Finds the column and position holding `task_id`.
    #[must_use]
    pub fn locate(&self, task_id: TaskId) -> Option<(TaskStatus, usize)> {
        self.columns.iter().find_map(|(status, tasks)| {
            tasks
                .iter()
                .position(|task| task.id() == task_id)
                .map(|index| (*status, index))
        })
    }

    /// Returns the displayed copy of a task.
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.columns
            .values()
            .flatten()
            .find(|task| task.id() == task_id)
    }

    /// Returns the number of tasks in each column.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<TaskStatus, usize> {
        self.columns
            .iter()
            .map(|(status, tasks)| (*status, tasks.len()))
            .collect()
    }

    /// Returns every listed task id in board order.
    #[must_use]
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.columns.values().flatten().map(Task::id).collect()
    }

    /// Returns the total number of listed tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    /// Returns true when no column lists a task.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.values().all(Vec::is_empty)
    }

    /// Reorders one column without changing any task's status.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::IndexOutOfRange`] when either index falls
    /// outside the column.
    pub fn move_within_column(
        &self,
        status: TaskStatus,
        from_index: usize,
        to_index: usize,
    ) -> Result<Self, PartitionError> {
        let len = self.column(status).len();
        for index in [from_index, to_index] {
            if index >= len {
                return Err(PartitionError::IndexOutOfRange { status, index, len });
            }
        }

        let mut next = self.clone();
        let column = next.column_mut(status);
        let task = column.remove(from_index);
        column.insert(to_index, task);
        Ok(next)
    }

    /// Moves a task to the end of another column and updates its status.
    ///
    /// Moving within the same status returns an equal partition.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::TaskNotInColumn`] when `task_id` is not in
    /// `from`.
    pub fn move_across_columns(
        &self,
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<Self, PartitionError> {
        let target_len = self.column(to).len();
        self.relocate(task_id, from, to, target_len)
    }

    /// Moves a task into `to` at `index`, clamped to the column length.
    ///
    /// Used to undo a move so the task lands where it was before.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::TaskNotInColumn`] when `task_id` is not in
    /// `from`.
    pub fn restore_into(
        &self,
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
        index: usize,
    ) -> Result<Self, PartitionError> {
        self.relocate(task_id, from, to, index)
    }

    fn relocate(
        &self,
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
        index: usize,
    ) -> Result<Self, PartitionError> {
        let position = self
            .column(from)
            .iter()
            .position(|task| task.id() == task_id)
            .ok_or(PartitionError::TaskNotInColumn {
                task_id,
                status: from,
            })?;
        if from == to {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        let mut task = next.column_mut(from).remove(position);
        task.set_status(to);
        let target = next.column_mut(to);
        let slot = index.min(target.len());
        target.insert(slot, task);
        Ok(next)
    }

    /// Returns true when both partitions hold the same task ids in the same
    /// columns, ignoring order within a column.
    #[must_use]
    pub fn same_membership(&self, other: &Self) -> bool {
        TaskStatus::ALL.iter().all(|status| {
            let mine: BTreeSet<TaskId> = self.column(*status).iter().map(Task::id).collect();
            let theirs: BTreeSet<TaskId> = other.column(*status).iter().map(Task::id).collect();
            mine == theirs
        })
    }

    /// Verifies that every task in `source` is listed exactly once and that
    /// nothing else is listed.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::MembershipMismatch`] describing the
    /// discrepancy.
    pub fn check_complete(&self, source: &[Task]) -> Result<(), PartitionError> {
        let expected: BTreeSet<TaskId> = source.iter().map(Task::id).collect();
        let mut seen = BTreeSet::new();
        let mut duplicated = BTreeSet::new();
        for task_id in self.task_ids() {
            if !seen.insert(task_id) {
                duplicated.insert(task_id);
            }
        }

        let missing: Vec<TaskId> = expected.difference(&seen).copied().collect();
        let unexpected: Vec<TaskId> = seen.difference(&expected).copied().collect();
        if missing.is_empty() && duplicated.is_empty() && unexpected.is_empty() {
            return Ok(());
        }
        Err(PartitionError::MembershipMismatch {
            missing,
            duplicated: duplicated.into_iter().collect(),
            unexpected,
        })
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        self.columns.entry(status).or_default()
    }
}
