//! Kanban board consistency for project task sets.
//!
//! This module keeps a board view consistent while the user drags cards
//! between status columns and edits task dependencies. Moves are shown at
//! once and reconciled with the data service when it answers; dependency
//! edits are checked for cycles before anything is written. The module
//! follows hexagonal architecture:
//!
//! - Domain types and algorithms in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
