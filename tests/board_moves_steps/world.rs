//! Shared world state for board move BDD scenarios.

use gantry::board::{
    adapters::memory::{InMemoryTaskRepository, RecordingNotifier},
    domain::{MoveResolution, ProjectId, TaskStatus},
    services::{BoardError, KanbanBoard},
};
use rstest::fixture;

/// Project the scenario tasks belong to.
pub const PROJECT: ProjectId = ProjectId::new(1);

/// Board type used by the BDD world.
pub type TestBoard = KanbanBoard<InMemoryTaskRepository, RecordingNotifier>;

/// What the last drop did, with the write's resolution for real moves.
#[derive(Debug)]
pub enum DropResult {
    Moved(Result<MoveResolution, BoardError>),
    Reordered,
    Unchanged,
}

/// Scenario world for board move behaviour tests.
pub struct BoardMovesWorld {
    pub store: InMemoryTaskRepository,
    pub notifier: RecordingNotifier,
    pub board: Option<TestBoard>,
    pub last_drop: Option<DropResult>,
}

impl BoardMovesWorld {
    /// Creates a world with an empty store and no board.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: InMemoryTaskRepository::new(),
            notifier: RecordingNotifier::new(),
            board: None,
            last_drop: None,
        }
    }

    /// Returns the opened board.
    ///
    /// # Errors
    ///
    /// Returns an error if no board was opened yet.
    pub fn board(&self) -> eyre::Result<&TestBoard> {
        self.board
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing board in scenario world"))
    }
}

impl Default for BoardMovesWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> BoardMovesWorld {
    BoardMovesWorld::default()
}

/// Parses a status name used in the feature file.
///
/// # Errors
///
/// Returns an error for unknown status names.
pub fn parse_status(raw: &str) -> eyre::Result<TaskStatus> {
    TaskStatus::try_from(raw).map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
