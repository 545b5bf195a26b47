//! Runtime machine errors.

use crate::core::ActionFault;
use thiserror::Error;

/// Errors recorded by a running machine.
///
/// Guard and action failures are recovered locally when an error state is
/// declared; otherwise they halt processing and surface through
/// [`StateMachine::error_string`](crate::engine::StateMachine::error_string).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MachineError {
    /// `start()` was called while the machine was already started.
    #[error("machine already started; call stop() first")]
    AlreadyStarted,

    /// A guard predicate faulted during transition selection.
    #[error("guard evaluation failed in state '{state}': {fault}")]
    GuardFailed { state: String, fault: ActionFault },

    /// A transition action faulted during a microstep.
    #[error("action execution failed in state '{state}': {fault}")]
    ActionFailed { state: String, fault: ActionFault },
}
