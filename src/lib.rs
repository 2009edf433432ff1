//! Gantry: task boards for construction project management.
//!
//! This crate provides the client-side consistency engine behind a
//! project's kanban board: dependency cycle checks, the per-status
//! partition of tasks, optimistic drag-and-drop moves and their
//! reconciliation with the hosted data service.
//!
//! # Architecture
//!
//! Gantry follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (in-memory, logging)
//!
//! # Modules
//!
//! - [`board`]: Task dependencies, status columns and optimistic moves

pub mod board;
