//! User-notice port: toasts and inline explanations.

use crate::board::domain::{DependencyRejection, TaskId, TaskStatus};

/// Something the user must be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardNotice {
    /// A status write failed and the card snapped back.
    MoveFailed {
        /// Card that moved back.
        task_id: TaskId,
        /// Column it went back to.
        restored: TaskStatus,
        /// Failure description.
        reason: String,
    },
    /// A dependency assignment was refused locally.
    DependencyRejected {
        /// Task the dependency was meant for.
        task_id: TaskId,
        /// Why it was refused.
        rejection: DependencyRejection,
    },
    /// A dependency write failed at the data service.
    DependencyUpdateFailed {
        /// Task the dependency was meant for.
        task_id: TaskId,
        /// Failure description.
        reason: String,
    },
}

/// Surface that shows notices to the user.
pub trait BoardNotifier: Send + Sync {
    /// Shows a notice.
    fn notify(&self, notice: BoardNotice);
}
