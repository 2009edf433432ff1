//! Board view service.
//!
//! [`KanbanBoard`] owns one project's displayed partition and drag session.
//! Drops and status edits are applied optimistically and return at once;
//! the backend writes are queued and drained in issue order by a writer
//! task spawned in [`KanbanBoard::open`]. Each write's deadline starts when
//! it is queued. The writer replies before any follow-up refresh, which runs
//! on its own task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast::error::RecvError, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::BoardConfig;
use crate::board::{
    domain::{
        CoordinatorState, DependencyRejection, DragError, DragSession, DragState, DropOutcome,
        HoverTarget, MoveCoordinator, MoveError, MoveResolution, MoveTicket, PersistenceFailure,
        ProjectId, Reconciliation, SnapshotTicket, StatusPartition, Task, TaskId, TaskStatus, check_dependency,
        dependency, would_create_cycle,
    },
    ports::{
        BoardNotice, BoardNotifier, TaskChangeEvent, TaskChangeFeed, TaskChangeStream,
        TaskRepository, TaskRepositoryError,
    },
};

/// Service-level errors for board operations.
#[derive(Debug, Error)]
pub enum BoardError {
    /// The drag gesture was invalid.
    #[error(transparent)]
    Drag(#[from] DragError),
    /// The optimistic move could not start.
    #[error(transparent)]
    Move(#[from] MoveError),
    /// A dependency assignment was refused before reaching the backend.
    #[error("dependency rejected: {0}")]
    ValidationRejected(#[from] DependencyRejection),
    /// The data service failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// The task is not part of this board's project.
    #[error("task {0} is not on this board")]
    UnknownTask(TaskId),
    /// A panic while holding the board state left it unusable.
    #[error("board state lock poisoned")]
    StatePoisoned,
    /// Canonical data did not arrive in time.
    #[error("refresh timed out after {0:?}")]
    RefreshTimedOut(Duration),
    /// The status writer is no longer running.
    #[error("status writer stopped")]
    WriterClosed,
}

/// Result type for board operations.
pub type BoardResult<T> = Result<T, BoardError>;

/// Pending result of one queued status write.
#[derive(Debug)]
pub struct MoveHandle {
    task_id: TaskId,
    ticket: MoveTicket,
    receiver: oneshot::Receiver<BoardResult<MoveResolution>>,
}

impl MoveHandle {
    /// Returns the moved task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the move's ticket.
    #[must_use]
    pub const fn ticket(&self) -> MoveTicket {
        self.ticket
    }

    /// Waits for the write to resolve.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::WriterClosed`] when the writer stopped before
    /// answering, or the error the writer hit while resolving.
    pub async fn resolved(self) -> BoardResult<MoveResolution> {
        self.receiver.await.map_err(|_| BoardError::WriterClosed)?
    }
}

/// What finishing a drag did.
#[derive(Debug)]
pub enum DragCompletion {
    /// The card changed column; the write is in flight.
    Moved(MoveHandle),
    /// The card was reordered within its column.
    Reordered,
    /// Nothing changed.
    Unchanged,
}

/// What a change notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeHandling {
    /// The event belongs to another project.
    Ignored,
    /// The task has a move in flight; the refresh waits for it.
    Deferred,
    /// Canonical data was refetched.
    Refreshed(Reconciliation),
}

struct StatusWrite {
    task_id: TaskId,
    status: TaskStatus,
    ticket: MoveTicket,
    deadline: Option<Instant>,
    reply: oneshot::Sender<BoardResult<MoveResolution>>,
}

struct BoardState {
    coordinator: MoveCoordinator,
    drag: DragSession,
}

struct BoardCore<R, N> {
    project_id: ProjectId,
    repository: Arc<R>,
    notifier: Arc<N>,
    config: BoardConfig,
    state: Mutex<BoardState>,
}

impl<R, N> BoardCore<R, N>
where
    R: TaskRepository,
    N: BoardNotifier,
{
    fn with_state<T>(&self, f: impl FnOnce(&mut BoardState) -> T) -> BoardResult<T> {
        let mut state = self.state.lock().map_err(|_| BoardError::StatePoisoned)?;
        Ok(f(&mut state))
    }

    /// Fetches canonical data and applies it unless it went stale in flight.
    ///
    /// A fetch made stale only by a move resolution is repeated, since no
    /// newer fetch is coming to replace it.
    async fn refresh(&self) -> BoardResult<Reconciliation> {
        let timeout = self.config.refresh_timeout();
        loop {
            let snapshot = self.with_state(|state| state.coordinator.begin_snapshot())?;
            let tasks = self.fetch(snapshot, timeout).await?;
            let count = tasks.len();
            let (reconciliation, repeat) = self.with_state(|state| {
                let reconciliation = state.coordinator.apply_snapshot(snapshot, tasks);
                let repeat = reconciliation == Reconciliation::Stale
                    && state.coordinator.is_latest_snapshot(snapshot);
                (reconciliation, repeat)
            })?;
            if repeat {
                debug!(project_id = %self.project_id, "move resolved mid-fetch, refetching");
                continue;
            }
            info!(
                project_id = %self.project_id,
                tasks = count,
                ?reconciliation,
                "board refreshed"
            );
            return Ok(reconciliation);
        }
    }

    async fn fetch(&self, snapshot: SnapshotTicket, timeout: Duration) -> BoardResult<Vec<Task>> {
        let listing = self.repository.list_project_tasks(self.project_id);
        let listed = tokio::time::timeout(timeout, listing).await.map_err(|_| {
            warn!(
                project_id = %self.project_id,
                snapshot = snapshot.value(),
                "task list timed out"
            );
            BoardError::RefreshTimedOut(timeout)
        })?;
        Ok(listed?)
    }

    /// Issues one status write and folds its result into the display.
    ///
    /// Returns the resolution and whether canonical data should be refetched.
    async fn persist(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        ticket: MoveTicket,
        deadline: Option<Instant>,
    ) -> BoardResult<(MoveResolution, bool)> {
        let timeout = self.config.status_update_timeout();
        let outcome = match deadline {
            Some(due) if Instant::now() >= due => {
                debug!(%task_id, %ticket, "move expired while queued");
                Err(PersistenceFailure::TimedOut(timeout))
            }
            Some(due) => {
                let write = self.repository.update_task_status(task_id, status);
                match tokio::time::timeout_at(due, write).await {
                    Ok(written) => written_outcome(written),
                    Err(_) => Err(PersistenceFailure::TimedOut(timeout)),
                }
            }
            None => written_outcome(self.repository.update_task_status(task_id, status).await),
        };

        let (resolution, refresh_requested) = self.with_state(|state| {
            let resolution = state.coordinator.resolve(task_id, ticket, outcome);
            (resolution, state.coordinator.take_refresh_request())
        })?;

        if let MoveResolution::Reverted {
            restored, failure, ..
        } = &resolution
        {
            self.notifier.notify(BoardNotice::MoveFailed {
                task_id,
                restored: *restored,
                reason: failure.to_string(),
            });
        }

        let confirmed = matches!(resolution, MoveResolution::Confirmed { .. });
        let refresh = refresh_requested || (confirmed && self.config.refresh_on_confirm);
        Ok((resolution, refresh))
    }
}

fn written_outcome(written: Result<(), TaskRepositoryError>) -> Result<(), PersistenceFailure> {
    written.map_err(|err| PersistenceFailure::Rejected(err.to_string()))
}

async fn drain_status_writes<R, N>(
    core: Arc<BoardCore<R, N>>,
    mut writes: mpsc::UnboundedReceiver<StatusWrite>,
) where
    R: TaskRepository + 'static,
    N: BoardNotifier + 'static,
{
    while let Some(write) = writes.recv().await {
        let task_id = write.task_id;
        let settled = core
            .persist(task_id, write.status, write.ticket, write.deadline)
            .await;
        let refresh = matches!(settled, Ok((_, true)));
        let resolution = settled.map(|(resolution, _)| resolution);
        if write.reply.send(resolution).is_err() {
            debug!(%task_id, "move handle dropped before resolution");
        }
        if refresh {
            spawn_refresh(Arc::clone(&core), task_id);
        }
    }
    debug!(project_id = %core.project_id, "status writer stopped");
}

fn spawn_refresh<R, N>(core: Arc<BoardCore<R, N>>, task_id: TaskId)
where
    R: TaskRepository + 'static,
    N: BoardNotifier + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = core.refresh().await {
            warn!(%task_id, %err, "refresh after move resolution failed");
        }
    });
}

fn start_move(
    state: &mut BoardState,
    task_id: TaskId,
    to: TaskStatus,
) -> BoardResult<Option<MoveTicket>> {
    let (from, _) = state
        .coordinator
        .displayed()
        .locate(task_id)
        .ok_or(BoardError::UnknownTask(task_id))?;
    if from == to {
        return Ok(None);
    }
    Ok(Some(state.coordinator.begin_move(task_id, from, to)?))
}

enum DropEffect {
    Move(TaskId, TaskStatus, MoveTicket),
    Reordered,
    Unchanged,
}

/// Kanban board view over one project's tasks.
pub struct KanbanBoard<R, N>
where
    R: TaskRepository + 'static,
    N: BoardNotifier + 'static,
{
    core: Arc<BoardCore<R, N>>,
    writes: mpsc::UnboundedSender<StatusWrite>,
}

impl<R, N> Clone for KanbanBoard<R, N>
where
    R: TaskRepository + 'static,
    N: BoardNotifier + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            writes: self.writes.clone(),
        }
    }
}

impl<R, N> KanbanBoard<R, N>
where
    R: TaskRepository + 'static,
    N: BoardNotifier + 'static,
{
    /// Loads the project's tasks and starts the status writer.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Repository`] when the initial fetch fails.
    pub async fn open(
        project_id: ProjectId,
        repository: Arc<R>,
        notifier: Arc<N>,
        config: BoardConfig,
    ) -> BoardResult<Self> {
        let tasks = repository.list_project_tasks(project_id).await?;
        info!(%project_id, tasks = tasks.len(), "board opened");

        let core = Arc::new(BoardCore {
            project_id,
            repository,
            notifier,
            config,
            state: Mutex::new(BoardState {
                coordinator: MoveCoordinator::new(tasks),
                drag: DragSession::new(),
            }),
        });
        let (writes, queue) = mpsc::unbounded_channel();
        tokio::spawn(drain_status_writes(Arc::clone(&core), queue));
        Ok(Self { core, writes })
    }

    /// Returns the board's project.
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.core.project_id
    }

    /// Returns the board configuration.
    #[must_use]
    pub fn config(&self) -> &BoardConfig {
        &self.core.config
    }

    /// Returns what the board should render: the drag preview while one
    /// exists, otherwise the possibly-optimistic partition.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::StatePoisoned`] when the state lock is poisoned.
    pub fn displayed_partition(&self) -> BoardResult<StatusPartition> {
        self.core.with_state(|state| {
            state
                .drag
                .preview()
                .unwrap_or_else(|| state.coordinator.displayed())
                .clone()
        })
    }

    /// Returns whether optimistic moves are outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::StatePoisoned`] when the state lock is poisoned.
    pub fn coordinator_state(&self) -> BoardResult<CoordinatorState> {
        self.core.with_state(|state| state.coordinator.state())
    }

    /// Returns the last canonical task list.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::StatePoisoned`] when the state lock is poisoned.
    pub fn canonical_tasks(&self) -> BoardResult<Vec<Task>> {
        self.core
            .with_state(|state| state.coordinator.canonical().to_vec())
    }

    /// Returns the drag session state.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::StatePoisoned`] when the state lock is poisoned.
    pub fn drag_state(&self) -> BoardResult<DragState> {
        self.core.with_state(|state| state.drag.state())
    }

    /// Picks up a card.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Drag`] when the card is not displayed.
    pub fn begin_drag(&self, task_id: TaskId) -> BoardResult<()> {
        self.core.with_state(|state| {
            state
                .drag
                .pointer_down(task_id, state.coordinator.displayed())
        })??;
        Ok(())
    }

    /// Moves the hover target of the active drag.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Drag`] outside a drag or for unknown cards.
    pub fn update_drag_hover(&self, target: HoverTarget) -> BoardResult<()> {
        self.core.with_state(|state| {
            state
                .drag
                .hover_over(target, state.coordinator.displayed())
        })??;
        Ok(())
    }

    /// Drops the dragged card onto a column.
    ///
    /// A column change is applied optimistically and its write queued; the
    /// returned handle resolves once the backend answers.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Drag`] outside a drag, [`BoardError::Move`] or
    /// [`BoardError::UnknownTask`] when the move cannot start, or
    /// [`BoardError::WriterClosed`] when the write cannot be queued.
    pub fn complete_drag(&self, target: TaskStatus) -> BoardResult<DragCompletion> {
        let effect = self.core.with_state(|state| -> BoardResult<DropEffect> {
            match state.drag.drop_on(target)? {
                DropOutcome::CrossColumn { task_id, to, .. } => {
                    Ok(match start_move(state, task_id, to)? {
                        Some(ticket) => DropEffect::Move(task_id, to, ticket),
                        None => DropEffect::Unchanged,
                    })
                }
                DropOutcome::Reordered(preview) => {
                    if state.coordinator.keep_local_reorder(preview) {
                        Ok(DropEffect::Reordered)
                    } else {
                        Ok(DropEffect::Unchanged)
                    }
                }
                DropOutcome::Unchanged => Ok(DropEffect::Unchanged),
            }
        })??;

        match effect {
            DropEffect::Move(task_id, to, ticket) => {
                Ok(DragCompletion::Moved(self.enqueue(task_id, to, ticket)?))
            }
            DropEffect::Reordered => Ok(DragCompletion::Reordered),
            DropEffect::Unchanged => Ok(DragCompletion::Unchanged),
        }
    }

    /// Abandons the active drag. Returns false when none was active.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::StatePoisoned`] when the state lock is poisoned.
    pub fn cancel_drag(&self) -> BoardResult<bool> {
        self.core.with_state(|state| state.drag.cancel())
    }

    /// Changes a task's status outside a drag, e.g. from an edit form.
    ///
    /// Returns `None` when the task already holds `to`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::UnknownTask`] for tasks not on the board or
    /// [`BoardError::WriterClosed`] when the write cannot be queued.
    pub fn move_task(&self, task_id: TaskId, to: TaskStatus) -> BoardResult<Option<MoveHandle>> {
        let ticket = self
            .core
            .with_state(|state| start_move(state, task_id, to))??;
        ticket
            .map(|issued| self.enqueue(task_id, to, issued))
            .transpose()
    }

    /// Moves several tasks to one status, issuing one write per task that
    /// actually changes column.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::UnknownTask`] before moving anything when any
    /// id is not on the board.
    pub fn bulk_move(&self, task_ids: &[TaskId], to: TaskStatus) -> BoardResult<Vec<MoveHandle>> {
        let missing = self.core.with_state(|state| {
            task_ids
                .iter()
                .find(|task_id| state.coordinator.displayed().locate(**task_id).is_none())
                .copied()
        })?;
        if let Some(task_id) = missing {
            return Err(BoardError::UnknownTask(task_id));
        }

        let mut handles = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            if let Some(handle) = self.move_task(*task_id, to)? {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Returns true when making `task_id` depend on `candidate` would create
    /// a cycle in the project's current dependency graph.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::StatePoisoned`] when the state lock is poisoned.
    pub fn validate_dependency_candidate(
        &self,
        task_id: TaskId,
        candidate: TaskId,
    ) -> BoardResult<bool> {
        self.core.with_state(|state| {
            would_create_cycle(task_id, candidate, state.coordinator.canonical())
        })
    }

    /// Lists the tasks `task_id` may be made to depend on.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::StatePoisoned`] when the state lock is poisoned.
    pub fn dependency_candidates(&self, task_id: TaskId) -> BoardResult<Vec<Task>> {
        let hide_completed = self.core.config.hide_completed_candidates;
        self.core.with_state(|state| {
            dependency::dependency_candidates(task_id, state.coordinator.canonical(), hide_completed)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Returns true when no unfinished predecessor holds the task back.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::UnknownTask`] for tasks not on the board.
    pub fn is_startable(&self, task_id: TaskId) -> BoardResult<bool> {
        self.core.with_state(|state| {
            let tasks = state.coordinator.canonical();
            tasks
                .iter()
                .find(|task| task.id() == task_id)
                .map(|task| dependency::is_startable(task, tasks))
                .ok_or(BoardError::UnknownTask(task_id))
        })?
    }

    /// Makes `task_id` depend on `candidate` after checking for cycles.
    ///
    /// Rejected edges are reported to the notifier and never written.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::UnknownTask`] when either task is not on the
    /// board, [`BoardError::ValidationRejected`] when the edge would create
    /// a cycle, or [`BoardError::Repository`] when the write fails.
    pub async fn assign_dependency(&self, task_id: TaskId, candidate: TaskId) -> BoardResult<()> {
        let checked = self.core.with_state(|state| {
            let tasks = state.coordinator.canonical();
            for id in [task_id, candidate] {
                if !tasks.iter().any(|task| task.id() == id) {
                    return Err(BoardError::UnknownTask(id));
                }
            }
            Ok(check_dependency(task_id, candidate, tasks))
        })??;

        if let Err(rejection) = checked {
            debug!(%task_id, %candidate, %rejection, "dependency rejected");
            self.core.notifier.notify(BoardNotice::DependencyRejected {
                task_id,
                rejection: rejection.clone(),
            });
            return Err(BoardError::ValidationRejected(rejection));
        }
        self.write_dependency(task_id, Some(candidate)).await
    }

    /// Removes any dependency from `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::UnknownTask`] when the task is not on the board
    /// or [`BoardError::Repository`] when the write fails.
    pub async fn clear_dependency(&self, task_id: TaskId) -> BoardResult<()> {
        let known = self.core.with_state(|state| {
            state
                .coordinator
                .canonical()
                .iter()
                .any(|task| task.id() == task_id)
        })?;
        if !known {
            return Err(BoardError::UnknownTask(task_id));
        }
        self.write_dependency(task_id, None).await
    }

    /// Refetches canonical tasks and rebuilds the display.
    ///
    /// Returns [`Reconciliation::Stale`] when a fetch started later landed
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Repository`] when the fetch fails or
    /// [`BoardError::RefreshTimedOut`] when it does not answer in time.
    pub async fn refresh(&self) -> BoardResult<Reconciliation> {
        self.core.refresh().await
    }

    /// Reacts to one change notification.
    ///
    /// Events for a task with a move in flight are deferred until that move
    /// resolves; anything else triggers a refresh.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Repository`] when the refresh fails.
    pub async fn handle_change(&self, event: TaskChangeEvent) -> BoardResult<ChangeHandling> {
        if event.project_id != self.core.project_id {
            return Ok(ChangeHandling::Ignored);
        }
        let deferred = self
            .core
            .with_state(|state| state.coordinator.defer_change(event.task_id))?;
        if deferred {
            return Ok(ChangeHandling::Deferred);
        }
        Ok(ChangeHandling::Refreshed(self.core.refresh().await?))
    }

    /// Processes change notifications until the stream closes.
    ///
    /// Refresh failures are logged and the loop continues. A lagged stream
    /// triggers a full refresh.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::StatePoisoned`] when the state lock is poisoned.
    pub async fn follow_changes(&self, mut changes: TaskChangeStream) -> BoardResult<()> {
        loop {
            let handled = match changes.recv().await {
                Ok(event) => self.handle_change(event).await.map(|handling| {
                    debug!(task_id = %event.task_id, ?handling, "change notification handled");
                }),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change stream lagged, refreshing");
                    self.core.refresh().await.map(|_| ())
                }
                Err(RecvError::Closed) => {
                    debug!(project_id = %self.core.project_id, "change stream closed");
                    return Ok(());
                }
            };
            match handled {
                Ok(()) => {}
                Err(err @ (BoardError::Repository(_) | BoardError::RefreshTimedOut(_))) => {
                    warn!(%err, "refresh after change notification failed");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Subscribes to the project's change feed and follows it on a spawned
    /// task.
    pub fn spawn_change_follower(&self, feed: &impl TaskChangeFeed) -> JoinHandle<BoardResult<()>> {
        let changes = feed.subscribe(self.core.project_id);
        let board = self.clone();
        tokio::spawn(async move { board.follow_changes(changes).await })
    }

    fn enqueue(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        ticket: MoveTicket,
    ) -> BoardResult<MoveHandle> {
        let (reply, receiver) = oneshot::channel();
        let deadline = Instant::now().checked_add(self.core.config.status_update_timeout());
        let write = StatusWrite {
            task_id,
            status,
            ticket,
            deadline,
            reply,
        };
        if self.writes.send(write).is_err() {
            let failure = PersistenceFailure::Rejected("status writer stopped".to_owned());
            self.core
                .with_state(|state| state.coordinator.resolve(task_id, ticket, Err(failure)))?;
            return Err(BoardError::WriterClosed);
        }
        debug!(%task_id, %status, %ticket, "status write queued");
        Ok(MoveHandle {
            task_id,
            ticket,
            receiver,
        })
    }

    async fn write_dependency(
        &self,
        task_id: TaskId,
        dependency_id: Option<TaskId>,
    ) -> BoardResult<()> {
        if let Err(err) = self
            .core
            .repository
            .update_task_dependency(task_id, dependency_id)
            .await
        {
            self.core.notifier.notify(BoardNotice::DependencyUpdateFailed {
                task_id,
                reason: err.to_string(),
            });
            return Err(err.into());
        }
        info!(%task_id, dependency = ?dependency_id, "dependency updated");
        self.core.refresh().await?;
        Ok(())
    }
}
