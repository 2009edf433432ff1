//! Adapter implementations for board ports.

pub mod logging;
pub mod memory;
