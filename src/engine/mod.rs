//! The runtime half of the crate: queues, transition selection, the
//! microstep cycle, and the machine lifecycle that ties them together.
//!
//! The engine is single-threaded and event-loop-cooperative. External
//! producers hand events over through the thread-safe queue (directly or
//! via a [`PostHandle`]); the owning context drains them with
//! [`StateMachine::process_events`]. One dequeued event drives one
//! macrostep: an event-driven microstep followed by eventless microsteps
//! until the configuration is stable.

pub mod error;
pub mod machine;
pub mod microstep;
pub mod queue;
pub mod selector;

pub use error::MachineError;
pub use machine::{PostHandle, RunState, StateMachine, StopReason};
pub use queue::DelayedEventId;
