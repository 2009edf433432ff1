//! Drag, drop and status write round trips against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::{
    GatedTaskRepository, HeldListRepository, displayed_status, eventually, open_board, task,
};
use gantry::board::{
    adapters::memory::InMemoryTaskRepository,
    domain::{CoordinatorState, HoverTarget, MoveResolution, PersistenceFailure, TaskId, TaskStatus},
    ports::BoardNotice,
    services::{BoardConfig, DragCompletion},
};
use rstest::{fixture, rstest};

#[fixture]
fn store() -> InMemoryTaskRepository {
    InMemoryTaskRepository::with_tasks([
        task(1, TaskStatus::Todo),
        task(2, TaskStatus::Todo),
        task(3, TaskStatus::InProgress),
    ])
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dropped_card_is_persisted_and_refetched(
    store: InMemoryTaskRepository,
) -> eyre::Result<()> {
    let (board, notifier) = open_board(Arc::new(store.clone()), BoardConfig::default()).await?;

    board.begin_drag(TaskId::new(1))?;
    board.update_drag_hover(HoverTarget::Column(TaskStatus::Review))?;
    let DragCompletion::Moved(handle) = board.complete_drag(TaskStatus::Review)? else {
        eyre::bail!("expected a cross-column move");
    };
    let resolution = handle.resolved().await?;

    eyre::ensure!(
        resolution
            == MoveResolution::Confirmed {
                task_id: TaskId::new(1),
                status: TaskStatus::Review,
            }
    );
    let stored = store
        .task(TaskId::new(1))?
        .ok_or_else(|| eyre::eyre!("task 1 missing from store"))?;
    eyre::ensure!(stored.status() == TaskStatus::Review);
    eventually(|| {
        board.canonical_tasks().is_ok_and(|canonical| {
            canonical
                .iter()
                .any(|t| t.id() == TaskId::new(1) && t.status() == TaskStatus::Review)
        })
    })
    .await?;
    eyre::ensure!(notifier.notices().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn move_is_visible_before_the_write_lands(
    store: InMemoryTaskRepository,
) -> eyre::Result<()> {
    let (repository, mut gate) = GatedTaskRepository::new(store);
    let repository = Arc::new(repository);
    let (board, _notifier) = open_board(Arc::clone(&repository), BoardConfig::default()).await?;

    let handle = board
        .move_task(TaskId::new(3), TaskStatus::Completed)?
        .ok_or_else(|| eyre::eyre!("expected a status write"))?;
    let held = gate.next_write().await?;

    eyre::ensure!(displayed_status(&board, TaskId::new(3))? == TaskStatus::Completed);
    eyre::ensure!(board.coordinator_state()? == CoordinatorState::PendingMove);
    let stored = repository
        .inner()
        .task(TaskId::new(3))?
        .ok_or_else(|| eyre::eyre!("task 3 missing from store"))?;
    eyre::ensure!(stored.status() == TaskStatus::InProgress);

    eyre::ensure!(held.release());
    handle.resolved().await?;
    eyre::ensure!(board.coordinator_state()? == CoordinatorState::Idle);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_write_snaps_the_card_back(store: InMemoryTaskRepository) -> eyre::Result<()> {
    store.reject_status_updates(TaskId::new(2), "permission denied")?;
    let (board, notifier) = open_board(Arc::new(store.clone()), BoardConfig::default()).await?;
    let before = board.displayed_partition()?;

    board.begin_drag(TaskId::new(2))?;
    let DragCompletion::Moved(handle) = board.complete_drag(TaskStatus::Blocked)? else {
        eyre::bail!("expected a cross-column move");
    };
    let resolution = handle.resolved().await?;

    eyre::ensure!(matches!(
        resolution,
        MoveResolution::Reverted {
            restored: TaskStatus::Todo,
            failure: PersistenceFailure::Rejected(_),
            ..
        }
    ));
    eyre::ensure!(board.displayed_partition()? == before);
    eyre::ensure!(store.status_writes()?.is_empty());
    eyre::ensure!(matches!(
        notifier.notices().as_slice(),
        [BoardNotice::MoveFailed { restored: TaskStatus::Todo, .. }]
    ));
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unanswered_write_times_out_and_reverts(
    store: InMemoryTaskRepository,
) -> eyre::Result<()> {
    let (repository, mut gate) = GatedTaskRepository::new(store);
    let config = BoardConfig::default().with_status_update_timeout(Duration::from_secs(15));
    let (board, notifier) = open_board(Arc::new(repository), config).await?;

    let handle = board
        .move_task(TaskId::new(1), TaskStatus::InProgress)?
        .ok_or_else(|| eyre::eyre!("expected a status write"))?;
    let _held = gate.next_write().await?;
    let resolution = handle.resolved().await?;

    eyre::ensure!(matches!(
        resolution,
        MoveResolution::Reverted {
            restored: TaskStatus::Todo,
            failure: PersistenceFailure::TimedOut(timeout),
            ..
        } if timeout == Duration::from_secs(15)
    ));
    eyre::ensure!(displayed_status(&board, TaskId::new(1))? == TaskStatus::Todo);
    eyre::ensure!(notifier.notices().len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn hung_refetch_does_not_hold_up_later_writes(
    store: InMemoryTaskRepository,
) -> eyre::Result<()> {
    let (repository, _lists) = HeldListRepository::new(store.clone());
    let repository = Arc::new(repository);
    let (board, _notifier) = open_board(Arc::clone(&repository), BoardConfig::default()).await?;
    repository.hold_lists(usize::MAX);

    let first = board
        .move_task(TaskId::new(1), TaskStatus::Review)?
        .ok_or_else(|| eyre::eyre!("expected a status write"))?;
    let second = board
        .move_task(TaskId::new(2), TaskStatus::InProgress)?
        .ok_or_else(|| eyre::eyre!("expected a status write"))?;
    let first_resolution =
        tokio::time::timeout(Duration::from_secs(1), first.resolved()).await??;
    let second_resolution =
        tokio::time::timeout(Duration::from_secs(1), second.resolved()).await??;

    eyre::ensure!(matches!(first_resolution, MoveResolution::Confirmed { .. }));
    eyre::ensure!(matches!(second_resolution, MoveResolution::Confirmed { .. }));
    eyre::ensure!(
        store.status_writes()?
            == vec![
                (TaskId::new(1), TaskStatus::Review),
                (TaskId::new(2), TaskStatus::InProgress),
            ]
    );
    eyre::ensure!(board.coordinator_state()? == CoordinatorState::Idle);
    eyre::ensure!(displayed_status(&board, TaskId::new(2))? == TaskStatus::InProgress);
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn queued_move_times_out_from_when_it_was_issued(
    store: InMemoryTaskRepository,
) -> eyre::Result<()> {
    let (repository, mut gate) = GatedTaskRepository::new(store.clone());
    let config = BoardConfig::default().with_status_update_timeout(Duration::from_secs(15));
    let (board, notifier) = open_board(Arc::new(repository), config).await?;
    let issued = tokio::time::Instant::now();

    let first = board
        .move_task(TaskId::new(1), TaskStatus::Review)?
        .ok_or_else(|| eyre::eyre!("expected a status write"))?;
    let second = board
        .move_task(TaskId::new(2), TaskStatus::Blocked)?
        .ok_or_else(|| eyre::eyre!("expected a status write"))?;
    let parked = gate.next_write().await?;
    let second_resolution = second.resolved().await?;

    eyre::ensure!(issued.elapsed() < Duration::from_secs(16));
    eyre::ensure!(matches!(
        second_resolution,
        MoveResolution::Reverted {
            restored: TaskStatus::Todo,
            failure: PersistenceFailure::TimedOut(_),
            ..
        }
    ));
    eyre::ensure!(matches!(
        first.resolved().await?,
        MoveResolution::Reverted { restored: TaskStatus::Todo, .. }
    ));
    eyre::ensure!(gate.next_write().await.is_err(), "expired move still reached the service");
    eyre::ensure!(displayed_status(&board, TaskId::new(2))? == TaskStatus::Todo);
    eyre::ensure!(notifier.notices().len() == 2);
    eyre::ensure!(store.status_writes()?.is_empty());
    drop(parked);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reorder_within_a_column_writes_nothing(
    store: InMemoryTaskRepository,
) -> eyre::Result<()> {
    let (board, _notifier) = open_board(Arc::new(store.clone()), BoardConfig::default()).await?;

    board.begin_drag(TaskId::new(2))?;
    board.update_drag_hover(HoverTarget::Card(TaskId::new(1)))?;
    let preview = board.displayed_partition()?;
    let completion = board.complete_drag(TaskStatus::Todo)?;

    eyre::ensure!(matches!(completion, DragCompletion::Reordered));
    let order: Vec<TaskId> = board
        .displayed_partition()?
        .column(TaskStatus::Todo)
        .iter()
        .map(gantry::board::domain::Task::id)
        .collect();
    eyre::ensure!(order == vec![TaskId::new(2), TaskId::new(1)]);
    eyre::ensure!(board.displayed_partition()? == preview);
    eyre::ensure!(store.status_writes()?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_drag_leaves_the_board_alone(
    store: InMemoryTaskRepository,
) -> eyre::Result<()> {
    let (board, _notifier) = open_board(Arc::new(store), BoardConfig::default()).await?;
    let before = board.displayed_partition()?;

    board.begin_drag(TaskId::new(1))?;
    board.update_drag_hover(HoverTarget::Card(TaskId::new(2)))?;
    eyre::ensure!(board.cancel_drag()?);

    eyre::ensure!(board.displayed_partition()? == before);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bulk_move_writes_each_changed_card_in_order(
    store: InMemoryTaskRepository,
) -> eyre::Result<()> {
    let (board, _notifier) = open_board(Arc::new(store.clone()), BoardConfig::default()).await?;

    let handles = board.bulk_move(
        &[TaskId::new(1), TaskId::new(3), TaskId::new(2)],
        TaskStatus::InProgress,
    )?;
    eyre::ensure!(handles.len() == 2);
    for handle in handles {
        handle.resolved().await?;
    }

    eyre::ensure!(
        store.status_writes()?
            == vec![
                (TaskId::new(1), TaskStatus::InProgress),
                (TaskId::new(2), TaskStatus::InProgress),
            ]
    );
    eyre::ensure!(board.displayed_partition()?.column(TaskStatus::InProgress).len() == 3);
    Ok(())
}
