//! Domain model for the kanban board.
//!
//! Pure types and algorithms: the task record, dependency validation, the
//! status partition, the optimistic move coordinator and the drag session.
//! Nothing here performs I/O.

mod coordinator;
pub mod dependency;
mod drag;
mod error;
mod ids;
mod partition;
mod task;

pub use coordinator::{
    CoordinatorState, MoveCoordinator, MoveResolution, MoveTicket, Reconciliation,
    SnapshotTicket,
};
pub use dependency::{check_dependency, would_create_cycle};
pub use drag::{DragSession, DragState, DropOutcome, HoverTarget};
pub use error::{
    DependencyRejection, DragError, MoveError, ParseTaskStatusError, PartitionError,
    PersistenceFailure,
};
pub use ids::{ProjectId, TaskId};
pub use partition::StatusPartition;
pub use task::{Task, TaskStatus};
