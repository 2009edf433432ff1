//! Application services for board views.

mod board;
mod config;

pub use board::{
    BoardError, BoardResult, ChangeHandling, DragCompletion, KanbanBoard, MoveHandle,
};
pub use config::BoardConfig;
