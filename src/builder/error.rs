//! Build errors for statechart authoring.

use crate::core::StateId;
use thiserror::Error;

/// Errors detected eagerly while authoring or validating the static
/// graph, before the machine ever runs.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("state '{parent}' cannot own children; only compound and parallel states can")]
    ParentNotComposite { parent: String },

    #[error("compound state '{state}' has children but declares no initial child. Call .initial(state, child)")]
    MissingInitialChild { state: String },

    #[error("initial state '{initial}' is not a child of '{state}'")]
    InitialNotChild { state: String, initial: String },

    #[error("parallel state '{state}' declares no regions")]
    EmptyParallel { state: String },

    #[error("final state '{state}' cannot declare outgoing transitions")]
    TransitionFromFinal { state: String },

    #[error("state id {0} does not belong to this graph")]
    UnknownState(StateId),

    #[error("error state '{error_state}' declared for '{state}' must not be one of its ancestors")]
    ErrorStateIsAncestor { state: String, error_state: String },
}
