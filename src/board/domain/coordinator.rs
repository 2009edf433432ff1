//! Optimistic move coordinator.
//!
//! Holds the last canonical task list and the displayed partition, which is
//! `derive(canonical)` with the still-pending moves applied on top. Each
//! task has at most one pending move; a newer move on the same task
//! supersedes the older one and the older resolution becomes a no-op.
//!
//! Canonical fetches are sequenced with [`SnapshotTicket`]s. A fetch issued
//! before the last applied fetch, or before the last move resolution, is
//! dropped when it arrives.

use super::{MoveError, PersistenceFailure, StatusPartition, Task, TaskId, TaskStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Sequence number identifying one optimistic move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoveTicket(u64);

impl MoveTicket {
    /// Returns the sequence number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MoveTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sequence number of one canonical fetch, taken before the fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotTicket(u64);

impl SnapshotTicket {
    /// Returns the sequence number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Whether the displayed partition carries optimistic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing pending; the display follows canonical data.
    Idle,
    /// At least one optimistic move awaits its backend result.
    PendingMove,
}

/// How a backend result was folded into the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveResolution {
    /// The write succeeded; canonical data will agree on the next refresh.
    Confirmed {
        /// Moved task.
        task_id: TaskId,
        /// Status the backend accepted.
        status: TaskStatus,
    },
    /// The write failed and the card went back to its origin column.
    Reverted {
        /// Moved task.
        task_id: TaskId,
        /// Status the card was returned to.
        restored: TaskStatus,
        /// Why the write failed.
        failure: PersistenceFailure,
    },
    /// A newer move on the same task took over; this result was ignored.
    Superseded {
        /// Moved task.
        task_id: TaskId,
        /// Ticket of the ignored move.
        ticket: MoveTicket,
    },
}

/// Result of folding a fresh canonical task list into the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing was pending; the display is exactly `derive(canonical)`.
    Replaced,
    /// Pending moves were re-applied over `derive(canonical)`.
    Reconciled {
        /// Tasks whose pending move was re-applied.
        reapplied: Vec<TaskId>,
    },
    /// The fetch was issued before newer canonical data or a move
    /// resolution; it was dropped and the display left alone.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingMove {
    ticket: MoveTicket,
    from: TaskStatus,
    to: TaskStatus,
    origin_index: usize,
    supersedes: bool,
}

/// Owns the optimistic overlay on top of canonical board data.
#[derive(Debug, Clone)]
pub struct MoveCoordinator {
    canonical: Vec<Task>,
    displayed: StatusPartition,
    pending: BTreeMap<TaskId, PendingMove>,
    deferred: BTreeSet<TaskId>,
    refresh_requested: bool,
    next_ticket: u64,
    snapshots_issued: u64,
    snapshot_floor: u64,
}

impl MoveCoordinator {
    /// Creates an idle coordinator displaying `derive(canonical)`.
    #[must_use]
    pub fn new(canonical: Vec<Task>) -> Self {
        let displayed = StatusPartition::derive(&canonical);
        Self {
            canonical,
            displayed,
            pending: BTreeMap::new(),
            deferred: BTreeSet::new(),
            refresh_requested: false,
            next_ticket: 1,
            snapshots_issued: 0,
            snapshot_floor: 0,
        }
    }

    /// Returns the last canonical task list.
    #[must_use]
    pub fn canonical(&self) -> &[Task] {
        &self.canonical
    }

    /// Returns the partition the board should show.
    #[must_use]
    pub const fn displayed(&self) -> &StatusPartition {
        &self.displayed
    }

    /// Returns whether any optimistic move is outstanding.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        if self.pending.is_empty() {
            CoordinatorState::Idle
        } else {
            CoordinatorState::PendingMove
        }
    }

    /// Returns true when `task_id` has an outstanding move.
    #[must_use]
    pub fn is_pending(&self, task_id: TaskId) -> bool {
        self.pending.contains_key(&task_id)
    }

    /// Returns the ticket and target of the outstanding move on `task_id`.
    #[must_use]
    pub fn pending_move(&self, task_id: TaskId) -> Option<(MoveTicket, TaskStatus)> {
        self.pending
            .get(&task_id)
            .map(|pending| (pending.ticket, pending.to))
    }

    /// Applies a cross-column move to the display and records it as pending.
    ///
    /// A pending move on the same task is superseded: the new target wins and
    /// the old ticket will resolve as [`MoveResolution::Superseded`].
    ///
    /// # Errors
    ///
    /// Returns [`MoveError::NoStatusChange`] when `from == to`,
    /// [`MoveError::UnknownTask`] when the task is not displayed, or a
    /// partition error when it is not in `from`.
    pub fn begin_move(
        &mut self,
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<MoveTicket, MoveError> {
        if from == to {
            return Err(MoveError::NoStatusChange {
                task_id,
                status: from,
            });
        }
        let (_, origin_index) = self
            .displayed
            .locate(task_id)
            .ok_or(MoveError::UnknownTask(task_id))?;
        let moved = self.displayed.move_across_columns(task_id, from, to)?;

        let ticket = MoveTicket(self.next_ticket);
        self.next_ticket += 1;
        let previous = self.pending.insert(
            task_id,
            PendingMove {
                ticket,
                from,
                to,
                origin_index,
                supersedes: false,
            },
        );
        if let Some(older) = previous {
            debug!(%task_id, superseded = %older.ticket, %ticket, "superseding pending move");
            if let Some(pending) = self.pending.get_mut(&task_id) {
                pending.supersedes = true;
            }
        }
        self.displayed = moved;
        debug!(%task_id, %from, %to, %ticket, "optimistic move applied");
        Ok(ticket)
    }

    /// Folds a backend result for `ticket` into the display.
    ///
    /// Results for tickets that are no longer current are ignored. A failure
    /// moves the card back into its origin column at its origin position.
    pub fn resolve(
        &mut self,
        task_id: TaskId,
        ticket: MoveTicket,
        outcome: Result<(), PersistenceFailure>,
    ) -> MoveResolution {
        self.snapshot_floor = self.snapshots_issued;
        let current = self.pending_move(task_id).map(|(current, _)| current);
        if current != Some(ticket) {
            debug!(%task_id, %ticket, "ignoring result of superseded move");
            return MoveResolution::Superseded { task_id, ticket };
        }
        let Some(pending) = self.pending.remove(&task_id) else {
            return MoveResolution::Superseded { task_id, ticket };
        };
        if self.deferred.remove(&task_id) {
            self.refresh_requested = true;
        }

        match outcome {
            Ok(()) => {
                info!(%task_id, status = %pending.to, %ticket, "move confirmed");
                MoveResolution::Confirmed {
                    task_id,
                    status: pending.to,
                }
            }
            Err(failure) => {
                warn!(%task_id, restored = %pending.from, %ticket, %failure, "reverting move");
                self.revert(task_id, pending);
                if pending.supersedes {
                    self.refresh_requested = true;
                }
                MoveResolution::Reverted {
                    task_id,
                    restored: pending.from,
                    failure,
                }
            }
        }
    }

    /// Numbers a canonical fetch that is about to start.
    pub const fn begin_snapshot(&mut self) -> SnapshotTicket {
        self.snapshots_issued += 1;
        SnapshotTicket(self.snapshots_issued)
    }

    /// Returns true when no fetch was numbered after `snapshot`.
    #[must_use]
    pub const fn is_latest_snapshot(&self, snapshot: SnapshotTicket) -> bool {
        snapshot.0 == self.snapshots_issued
    }

    /// Replaces canonical data with data fetched right now.
    pub fn apply_canonical(&mut self, tasks: Vec<Task>) -> Reconciliation {
        let snapshot = self.begin_snapshot();
        self.apply_snapshot(snapshot, tasks)
    }

    /// Replaces canonical data with the result of the fetch numbered
    /// `snapshot` and rebuilds the display from it.
    ///
    /// The previous display is discarded, never merged. Outstanding moves are
    /// re-applied over the fresh derivation and their revert target is
    /// re-based onto the canonical status. A fetch numbered before the last
    /// applied fetch or the last resolution is [`Reconciliation::Stale`].
    pub fn apply_snapshot(
        &mut self,
        snapshot: SnapshotTicket,
        tasks: Vec<Task>,
    ) -> Reconciliation {
        if snapshot.0 <= self.snapshot_floor {
            debug!(
                snapshot = snapshot.0,
                floor = self.snapshot_floor,
                "dropping stale canonical data"
            );
            return Reconciliation::Stale;
        }
        self.snapshot_floor = snapshot.0;
        self.canonical = tasks;
        let reapplied = self.rebuild();
        if self.pending.is_empty() {
            Reconciliation::Replaced
        } else {
            debug!(reapplied = reapplied.len(), "reconciled canonical data with pending moves");
            Reconciliation::Reconciled { reapplied }
        }
    }

    /// Records a change notification for a task with an outstanding move.
    ///
    /// Returns false when the task has nothing pending, in which case the
    /// caller should refresh now.
    pub fn defer_change(&mut self, task_id: TaskId) -> bool {
        if !self.is_pending(task_id) {
            return false;
        }
        debug!(%task_id, "deferring change notification until move resolves");
        self.deferred.insert(task_id);
        true
    }

    /// Returns and clears the flag set when a resolution left the display
    /// in need of canonical data.
    pub const fn take_refresh_request(&mut self) -> bool {
        let requested = self.refresh_requested;
        self.refresh_requested = false;
        requested
    }

    /// Keeps a within-column reorder finalized by a drop.
    ///
    /// The reorder lasts until the next canonical refresh. Returns false and
    /// leaves the display alone when `reordered` lists different members.
    pub fn keep_local_reorder(&mut self, reordered: StatusPartition) -> bool {
        if !self.displayed.same_membership(&reordered) {
            debug!("discarding reorder preview built from a stale display");
            return false;
        }
        self.displayed = reordered;
        true
    }

    fn revert(&mut self, task_id: TaskId, pending: PendingMove) {
        match self
            .displayed
            .restore_into(task_id, pending.to, pending.from, pending.origin_index)
        {
            Ok(restored) => self.displayed = restored,
            Err(err) => {
                debug!(%task_id, %err, "rebuilding display after revert");
                self.rebuild();
            }
        }
    }

    fn rebuild(&mut self) -> Vec<TaskId> {
        let mut display = StatusPartition::derive(&self.canonical);
        let mut ordered: Vec<(TaskId, PendingMove)> = self
            .pending
            .iter()
            .map(|(task_id, pending)| (*task_id, *pending))
            .collect();
        ordered.sort_by_key(|(_, pending)| pending.ticket);

        let mut reapplied = Vec::with_capacity(ordered.len());
        for (task_id, pending) in ordered {
            let Some((current, index)) = display.locate(task_id) else {
                continue;
            };
            if let Some(entry) = self.pending.get_mut(&task_id) {
                entry.from = current;
                entry.origin_index = index;
            }
            if current == pending.to {
                continue;
            }
            if let Ok(moved) = display.move_across_columns(task_id, current, pending.to) {
                display = moved;
                reapplied.push(task_id);
            }
        }
        self.displayed = display;
        reapplied
    }
}
