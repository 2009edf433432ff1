//! Notifier that records notices for later inspection.

use std::sync::{Arc, Mutex};

use crate::board::ports::{BoardNotice, BoardNotifier};

/// Collects every notice it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<BoardNotice>>>,
}

impl RecordingNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the notices recorded so far.
    #[must_use]
    pub fn notices(&self) -> Vec<BoardNotice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

impl BoardNotifier for RecordingNotifier {
    fn notify(&self, notice: BoardNotice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
