//! Overlapping moves on the same card.

use std::sync::Arc;

use super::helpers::{GatedTaskRepository, displayed_status, eventually, open_board, task};
use gantry::board::{
    adapters::memory::InMemoryTaskRepository,
    domain::{CoordinatorState, MoveResolution, TaskId, TaskStatus},
    services::BoardConfig,
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn last_issued_move_wins() -> eyre::Result<()> {
    let card = TaskId::new(5);
    let store = InMemoryTaskRepository::with_tasks([task(5, TaskStatus::Todo)]);
    let (repository, mut gate) = GatedTaskRepository::new(store);
    let repository = Arc::new(repository);
    let (board, notifier) = open_board(Arc::clone(&repository), BoardConfig::default()).await?;

    let first = board
        .move_task(card, TaskStatus::InProgress)?
        .ok_or_else(|| eyre::eyre!("expected first write"))?;
    let second = board
        .move_task(card, TaskStatus::Review)?
        .ok_or_else(|| eyre::eyre!("expected second write"))?;
    eyre::ensure!(displayed_status(&board, card)? == TaskStatus::Review);

    let first_ticket = first.ticket();
    let held = gate.next_write().await?;
    eyre::ensure!(held.status == TaskStatus::InProgress);
    eyre::ensure!(held.release());
    let first_resolution = first.resolved().await?;
    eyre::ensure!(
        first_resolution
            == MoveResolution::Superseded {
                task_id: card,
                ticket: first_ticket,
            }
    );
    eyre::ensure!(displayed_status(&board, card)? == TaskStatus::Review);
    eyre::ensure!(board.coordinator_state()? == CoordinatorState::PendingMove);

    let held = gate.next_write().await?;
    eyre::ensure!(held.status == TaskStatus::Review);
    eyre::ensure!(held.release());
    let second_resolution = second.resolved().await?;

    eyre::ensure!(
        second_resolution
            == MoveResolution::Confirmed {
                task_id: card,
                status: TaskStatus::Review,
            }
    );
    eyre::ensure!(displayed_status(&board, card)? == TaskStatus::Review);
    let stored = repository
        .inner()
        .task(card)?
        .ok_or_else(|| eyre::eyre!("card missing from store"))?;
    eyre::ensure!(stored.status() == TaskStatus::Review);
    eyre::ensure!(
        repository.inner().status_writes()?
            == vec![(card, TaskStatus::InProgress), (card, TaskStatus::Review)]
    );
    eyre::ensure!(notifier.notices().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stale_failure_does_not_undo_the_newer_move() -> eyre::Result<()> {
    let card = TaskId::new(8);
    let store = InMemoryTaskRepository::with_tasks([task(8, TaskStatus::Todo)]);
    let (repository, mut gate) = GatedTaskRepository::new(store);
    let (board, notifier) = open_board(Arc::new(repository), BoardConfig::default()).await?;

    let first = board
        .move_task(card, TaskStatus::Blocked)?
        .ok_or_else(|| eyre::eyre!("expected first write"))?;
    let second = board
        .move_task(card, TaskStatus::Completed)?
        .ok_or_else(|| eyre::eyre!("expected second write"))?;

    eyre::ensure!(gate.next_write().await?.reject("conflict"));
    let first_resolution = first.resolved().await?;
    eyre::ensure!(matches!(first_resolution, MoveResolution::Superseded { .. }));
    eyre::ensure!(displayed_status(&board, card)? == TaskStatus::Completed);
    eyre::ensure!(notifier.notices().is_empty());

    eyre::ensure!(gate.next_write().await?.release());
    second.resolved().await?;
    eyre::ensure!(displayed_status(&board, card)? == TaskStatus::Completed);
    eyre::ensure!(board.coordinator_state()? == CoordinatorState::Idle);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_newer_move_returns_to_the_previous_target() -> eyre::Result<()> {
    let card = TaskId::new(9);
    let store = InMemoryTaskRepository::with_tasks([task(9, TaskStatus::Todo)]);
    let (repository, mut gate) = GatedTaskRepository::new(store);
    let (board, notifier) = open_board(Arc::new(repository), BoardConfig::default()).await?;

    let first = board
        .move_task(card, TaskStatus::InProgress)?
        .ok_or_else(|| eyre::eyre!("expected first write"))?;
    let second = board
        .move_task(card, TaskStatus::Review)?
        .ok_or_else(|| eyre::eyre!("expected second write"))?;

    eyre::ensure!(gate.next_write().await?.release());
    first.resolved().await?;
    eyre::ensure!(gate.next_write().await?.reject("conflict"));
    let second_resolution = second.resolved().await?;

    eyre::ensure!(matches!(
        second_resolution,
        MoveResolution::Reverted {
            restored: TaskStatus::InProgress,
            ..
        }
    ));
    eyre::ensure!(displayed_status(&board, card)? == TaskStatus::InProgress);
    eyre::ensure!(notifier.notices().len() == 1);
    // The revert also requested a refetch, which sees the first write.
    eventually(|| {
        board.canonical_tasks().is_ok_and(|canonical| {
            canonical
                .iter()
                .any(|t| t.id() == card && t.status() == TaskStatus::InProgress)
        })
    })
    .await?;
    eyre::ensure!(displayed_status(&board, card)? == TaskStatus::InProgress);
    Ok(())
}
