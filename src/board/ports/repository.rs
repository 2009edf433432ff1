//! Repository port for the project task data service.

use crate::board::domain::{ProjectId, Task, TaskId, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Task data service contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Returns every task of a project, including status and dependency.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the service cannot
    /// be reached.
    async fn list_project_tasks(&self, project_id: ProjectId) -> TaskRepositoryResult<Vec<Task>>;

    /// Writes a task's status.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist
    /// or [`TaskRepositoryError::Rejected`] when the service refuses the
    /// write, e.g. under row-level authorization.
    async fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
    ) -> TaskRepositoryResult<()>;

    /// Writes or clears a task's dependency.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist
    /// or [`TaskRepositoryError::Rejected`] when the service refuses the
    /// write.
    async fn update_task_dependency(
        &self,
        task_id: TaskId,
        dependency_id: Option<TaskId>,
    ) -> TaskRepositoryResult<()>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The service refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Transport or service failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    #[must_use]
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
