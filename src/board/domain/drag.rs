//! Drag session state machine for a single card gesture.

use super::{DragError, StatusPartition, TaskId, TaskStatus};
use tracing::debug;

/// Whether a card is currently picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    /// No gesture in progress.
    NoDrag,
    /// A card is being dragged.
    Dragging {
        /// Card being dragged.
        task_id: TaskId,
        /// Column the card was picked up from.
        origin: TaskStatus,
    },
}

/// What the pointer is currently over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverTarget {
    /// A column, or empty space inside it.
    Column(TaskStatus),
    /// Another card.
    Card(TaskId),
}

/// What a drop asks the board to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The card left its origin column; a status write is needed.
    CrossColumn {
        /// Dropped card.
        task_id: TaskId,
        /// Column it was picked up from.
        from: TaskStatus,
        /// Column it was dropped on.
        to: TaskStatus,
    },
    /// The card stayed in its column and the preview order should be kept.
    Reordered(StatusPartition),
    /// The card was dropped where it started.
    Unchanged,
}

/// Tracks one drag gesture from pick-up to drop.
///
/// The session never mutates the board's partition. Live reordering is
/// kept in a preview that the board shows instead while the drag lasts.
#[derive(Debug, Clone)]
pub struct DragSession {
    state: DragState,
    hover: Option<HoverTarget>,
    preview: Option<StatusPartition>,
}

impl Default for DragSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DragSession {
    /// Creates a session with nothing picked up.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DragState::NoDrag,
            hover: None,
            preview: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> DragState {
        self.state
    }

    /// Returns the current hover target.
    #[must_use]
    pub const fn hover(&self) -> Option<HoverTarget> {
        self.hover
    }

    /// Returns the live-preview partition, if the drag reordered anything.
    #[must_use]
    pub const fn preview(&self) -> Option<&StatusPartition> {
        self.preview.as_ref()
    }

    /// Picks up `task_id` from `board`.
    ///
    /// Picking up while another drag is active cancels that drag first.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::UnknownTask`] when the card is not on the board.
    pub fn pointer_down(
        &mut self,
        task_id: TaskId,
        board: &StatusPartition,
    ) -> Result<(), DragError> {
        if let DragState::Dragging { task_id: active, .. } = self.state {
            debug!(%active, next = %task_id, "new pick-up cancels active drag");
            self.cancel();
        }
        let (origin, _) = board
            .locate(task_id)
            .ok_or(DragError::UnknownTask(task_id))?;
        self.state = DragState::Dragging { task_id, origin };
        Ok(())
    }

    /// Updates the hover target.
    ///
    /// Hovering a card in the dragged card's column reorders the preview.
    /// Hovering anywhere else only moves the hover affordance.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::NotDragging`] outside a drag,
    /// [`DragError::UnknownTask`] for a card that is not on the board, or a
    /// partition error from the preview reorder.
    pub fn hover_over(
        &mut self,
        target: HoverTarget,
        board: &StatusPartition,
    ) -> Result<(), DragError> {
        let DragState::Dragging { task_id, .. } = self.state else {
            return Err(DragError::NotDragging);
        };

        match target {
            HoverTarget::Column(_) => {
                self.hover = Some(target);
            }
            HoverTarget::Card(other) if other == task_id => {
                self.hover = Some(target);
            }
            HoverTarget::Card(other) => {
                let base = self.preview.as_ref().unwrap_or(board);
                let (other_status, other_index) =
                    base.locate(other).ok_or(DragError::UnknownTask(other))?;
                let (active_status, active_index) =
                    base.locate(task_id).ok_or(DragError::UnknownTask(task_id))?;

                if other_status == active_status {
                    let reordered =
                        base.move_within_column(active_status, active_index, other_index)?;
                    self.preview = Some(reordered);
                    self.hover = Some(target);
                } else {
                    self.hover = Some(HoverTarget::Column(other_status));
                }
            }
        }
        Ok(())
    }

    /// Ends the drag by dropping onto `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::NotDragging`] outside a drag.
    pub fn drop_on(&mut self, target: TaskStatus) -> Result<DropOutcome, DragError> {
        let DragState::Dragging { task_id, origin } = self.state else {
            return Err(DragError::NotDragging);
        };
        let preview = self.preview.take();
        self.reset();

        if target != origin {
            return Ok(DropOutcome::CrossColumn {
                task_id,
                from: origin,
                to: target,
            });
        }
        Ok(preview.map_or(DropOutcome::Unchanged, DropOutcome::Reordered))
    }

    /// Abandons the drag and discards any preview.
    ///
    /// Returns false when no drag was active.
    pub fn cancel(&mut self) -> bool {
        let was_dragging = matches!(self.state, DragState::Dragging { .. });
        self.reset();
        was_dragging
    }

    fn reset(&mut self) {
        self.state = DragState::NoDrag;
        self.hover = None;
        self.preview = None;
    }
}
