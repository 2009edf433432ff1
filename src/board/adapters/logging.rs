//! Notifier that writes user notices to the structured log.

use tracing::warn;

use crate::board::ports::{BoardNotice, BoardNotifier};

/// Logs each notice at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl BoardNotifier for TracingNotifier {
    fn notify(&self, notice: BoardNotice) {
        match notice {
            BoardNotice::MoveFailed {
                task_id,
                restored,
                reason,
            } => warn!(%task_id, %restored, %reason, "move failed, card returned"),
            BoardNotice::DependencyRejected { task_id, rejection } => {
                warn!(%task_id, %rejection, "dependency refused");
            }
            BoardNotice::DependencyUpdateFailed { task_id, reason } => {
                warn!(%task_id, %reason, "dependency update failed");
            }
        }
    }
}
