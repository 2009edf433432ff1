//! Port contracts for the board's external collaborators.
//!
//! Ports define infrastructure-agnostic interfaces to the project data
//! service, its change notifications and the user-notice surface.

pub mod changes;
pub mod notifier;
pub mod repository;

pub use changes::{ChangeKind, TaskChangeEvent, TaskChangeFeed, TaskChangeStream};
pub use notifier::{BoardNotice, BoardNotifier};
pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
