//! Authoring API for statecharts.
//!
//! This module provides fluent builders for registering states (kind,
//! parent, initial child), transitions (trigger, guard, targets,
//! actions), property assignments, and machine-wide policy, with eager
//! structural validation at build time.

pub mod error;
pub mod machine;
pub mod transition;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use transition::TransitionBuilder;
