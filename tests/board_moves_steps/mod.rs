//! Step definitions for board move scenarios.

pub mod world;
