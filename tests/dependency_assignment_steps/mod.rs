//! Step definitions for dependency assignment scenarios.

pub mod when;
