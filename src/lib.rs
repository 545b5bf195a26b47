//! Microstep: a hierarchical, event-driven statechart interpreter.
//!
//! Microstep executes statecharts: trees of nested and parallel states
//! where being "in a state" means holding a consistent set of states from
//! leaf to root (the active configuration). Events drive transitions;
//! each transition fires as one atomic microstep that exits states
//! deepest-first, runs the transition's actions, and enters states
//! ancestor-first with default-entry resolution.
//!
//! # Core Concepts
//!
//! - **Configuration**: the active state set, kept consistent by
//!   construction (exactly one active child per active compound, all
//!   regions active per active parallel)
//! - **Microstep / macrostep**: one event is consumed per macrostep,
//!   which runs microsteps until no eventless transition remains
//! - **Conflict resolution**: when enabled transitions would exit
//!   overlapping states, the deeper source wins; disjoint parallel
//!   regions fire simultaneously
//! - **Properties**: states may assign host properties on entry,
//!   optionally animated and optionally restored on exit
//!
//! # Example
//!
//! ```rust
//! use microstep::builder::{MachineBuilder, TransitionBuilder};
//! use microstep::core::Event;
//!
//! let mut b = MachineBuilder::new();
//! let root = b.root();
//! let idle = b.atomic("idle", root)?;
//! let work = b.compound("work", root)?;
//! let busy = b.atomic("busy", work)?;
//! let done = b.final_state("done", work)?;
//! b.initial(root, idle)?;
//! b.initial(work, busy)?;
//! b.transition(idle, TransitionBuilder::new().on("start").target(work))?;
//! b.transition(busy, TransitionBuilder::new().on("finish").target(done))?;
//!
//! let mut machine = b.build()?;
//! machine.start()?;
//! assert_eq!(machine.active_names(), vec!["root", "idle"]);
//!
//! machine.dispatch(Event::new("start"));
//! assert_eq!(machine.active_names(), vec!["root", "work", "busy"]);
//!
//! machine.dispatch(Event::new("finish"));
//! assert!(machine.is_active(done));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod core;
pub mod engine;
pub mod properties;
pub mod trace;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, TransitionBuilder};
pub use core::{Event, StateGraph, StateId, StateKind};
pub use engine::{MachineError, PostHandle, RunState, StateMachine, StopReason};
pub use properties::{PropertyAssignment, PropertyStore, RestorePolicy};
