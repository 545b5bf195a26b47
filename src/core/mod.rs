//! Pure structural core of the statechart.
//!
//! This module contains the static side of the interpreter:
//! - the arena-backed [`StateGraph`] of nested and parallel states
//! - [`Event`]s and trigger-pattern matching
//! - [`TransitionDef`]s with their guards and actions
//! - ancestor/domain queries and entry/exit orderings in [`hierarchy`]
//!
//! Nothing here mutates at runtime; the graph is built once and the
//! engine only queries it.

pub mod event;
pub mod graph;
pub mod hierarchy;
pub mod transition;

pub use event::{Event, DONE_STATE_PREFIX};
pub use graph::{StateGraph, StateId, StateKind, StateNode};
pub use transition::{ActionFault, ActionFn, GuardFn, TransitionDef};
