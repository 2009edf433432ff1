//! In-memory task data service for tests and local boards.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use crate::board::{
    domain::{ProjectId, Task, TaskId, TaskStatus},
    ports::{
        ChangeKind, TaskChangeEvent, TaskChangeFeed, TaskChangeStream, TaskRepository,
        TaskRepositoryError, TaskRepositoryResult,
    },
};

const FEED_CAPACITY: usize = 64;

/// Thread-safe in-memory task repository that also publishes change events.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
    feeds: Arc<Mutex<HashMap<ProjectId, broadcast::Sender<TaskChangeEvent>>>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: BTreeMap<TaskId, Task>,
    rejected_status_writes: HashMap<TaskId, String>,
    status_writes: Vec<(TaskId, TaskStatus)>,
}

fn lock_error(err: impl ToString) -> TaskRepositoryError {
    TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository seeded with `tasks`, without publishing events.
    #[must_use]
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let repository = Self::new();
        if let Ok(mut state) = repository.state.write() {
            state.tasks = tasks.into_iter().map(|task| (task.id(), task)).collect();
        }
        repository
    }

    /// Inserts or replaces a task and publishes the change.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the store lock is
    /// poisoned.
    pub fn upsert(&self, task: Task) -> TaskRepositoryResult<()> {
        let event = {
            let mut state = self.state.write().map_err(lock_error)?;
            let kind = if state.tasks.contains_key(&task.id()) {
                ChangeKind::Update
            } else {
                ChangeKind::Insert
            };
            let event = TaskChangeEvent::new(task.project_id(), task.id(), kind);
            state.tasks.insert(task.id(), task);
            event
        };
        self.publish(event);
        Ok(())
    }

    /// Deletes a task and publishes the change.
    ///
    /// Tasks depending on it are left dangling, as the data service does.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    pub fn delete(&self, task_id: TaskId) -> TaskRepositoryResult<()> {
        let removed = {
            let mut state = self.state.write().map_err(lock_error)?;
            state
                .tasks
                .remove(&task_id)
                .ok_or(TaskRepositoryError::NotFound(task_id))?
        };
        self.publish(TaskChangeEvent::new(
            removed.project_id(),
            task_id,
            ChangeKind::Delete,
        ));
        Ok(())
    }

    /// Makes every later status write for `task_id` fail with `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the store lock is
    /// poisoned.
    pub fn reject_status_updates(
        &self,
        task_id: TaskId,
        reason: impl Into<String>,
    ) -> TaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.rejected_status_writes.insert(task_id, reason.into());
        Ok(())
    }

    /// Lifts a rejection installed by [`Self::reject_status_updates`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the store lock is
    /// poisoned.
    pub fn accept_status_updates(&self, task_id: TaskId) -> TaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.rejected_status_writes.remove(&task_id);
        Ok(())
    }

    /// Returns the stored copy of a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the store lock is
    /// poisoned.
    pub fn task(&self, task_id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.tasks.get(&task_id).cloned())
    }

    /// Returns every accepted status write in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the store lock is
    /// poisoned.
    pub fn status_writes(&self) -> TaskRepositoryResult<Vec<(TaskId, TaskStatus)>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.status_writes.clone())
    }

    fn publish(&self, event: TaskChangeEvent) {
        let Ok(feeds) = self.feeds.lock() else {
            return;
        };
        if let Some(sender) = feeds.get(&event.project_id) {
            // No live subscribers is not an error for a broadcast feed.
            if sender.send(event).is_err() {
                debug!(task_id = %event.task_id, "change event had no subscribers");
            }
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn list_project_tasks(&self, project_id: ProjectId) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.project_id() == project_id)
            .cloned()
            .collect())
    }

    async fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
    ) -> TaskRepositoryResult<()> {
        let event = {
            let mut state = self.state.write().map_err(lock_error)?;
            if let Some(reason) = state.rejected_status_writes.get(&task_id) {
                return Err(TaskRepositoryError::Rejected(reason.clone()));
            }
            let task = state
                .tasks
                .get_mut(&task_id)
                .ok_or(TaskRepositoryError::NotFound(task_id))?;
            task.set_status(status);
            let event = TaskChangeEvent::new(task.project_id(), task_id, ChangeKind::Update);
            state.status_writes.push((task_id, status));
            event
        };
        self.publish(event);
        Ok(())
    }

    async fn update_task_dependency(
        &self,
        task_id: TaskId,
        dependency_id: Option<TaskId>,
    ) -> TaskRepositoryResult<()> {
        let event = {
            let mut state = self.state.write().map_err(lock_error)?;
            let task = state
                .tasks
                .get_mut(&task_id)
                .ok_or(TaskRepositoryError::NotFound(task_id))?;
            task.set_dependency(dependency_id);
            TaskChangeEvent::new(task.project_id(), task_id, ChangeKind::Update)
        };
        self.publish(event);
        Ok(())
    }
}

impl TaskChangeFeed for InMemoryTaskRepository {
    fn subscribe(&self, project_id: ProjectId) -> TaskChangeStream {
        match self.feeds.lock() {
            Ok(mut feeds) => feeds
                .entry(project_id)
                .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
                .subscribe(),
            Err(_) => broadcast::channel(1).1,
        }
    }
}
