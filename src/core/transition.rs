//! Transition definitions, guards, and actions.

use crate::core::event::{trigger_matches, Event};
use crate::core::graph::StateId;
use std::sync::Arc;
use thiserror::Error;

/// A runtime failure raised by a guard or an action.
///
/// Faults are caught at the action boundary, recorded on the machine, and
/// routed to the nearest declared error state; they never propagate to the
/// caller as panics.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionFault {
    /// Human-readable failure description.
    pub message: String,
}

impl ActionFault {
    /// Create a fault from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Guard predicate evaluated against the triggering event.
///
/// Guards are side-effect-free by contract and short-circuit: among
/// transitions on the same state, the first whose guard passes wins.
pub type GuardFn = Arc<dyn Fn(&Event) -> Result<bool, ActionFault> + Send + Sync>;

/// Transition-content action, run between exit and entry of a microstep.
pub type ActionFn = Arc<dyn Fn(&Event) -> Result<(), ActionFault> + Send + Sync>;

/// A directed edge of the statechart, owned by its source state.
///
/// A transition with no targets is targetless: when it fires, its actions
/// run but no state is exited or entered. A transition with no trigger is
/// eventless and is only considered during the eventless selection pass
/// that stabilizes a macrostep.
pub struct TransitionDef {
    pub(crate) source: StateId,
    pub(crate) targets: Vec<StateId>,
    pub(crate) trigger: Option<String>,
    pub(crate) guard: Option<GuardFn>,
    pub(crate) actions: Vec<ActionFn>,
}

impl TransitionDef {
    /// Source state of this transition.
    pub fn source(&self) -> StateId {
        self.source
    }

    /// Target states in document order; empty for targetless transitions.
    pub fn targets(&self) -> &[StateId] {
        &self.targets
    }

    /// The trigger pattern, `None` for eventless transitions.
    pub fn trigger(&self) -> Option<&str> {
        self.trigger.as_deref()
    }

    /// Trigger-level match: does this transition respond to `event`?
    /// `None` is the eventless selection pass.
    pub(crate) fn matches_trigger(&self, event: Option<&Event>) -> bool {
        match (&self.trigger, event) {
            (None, None) => true,
            (Some(trigger), Some(event)) => trigger_matches(trigger, &event.name),
            _ => false,
        }
    }

    /// Evaluate the guard, if any. A missing guard always passes.
    pub(crate) fn guard_passes(&self, event: &Event) -> Result<bool, ActionFault> {
        match &self.guard {
            Some(guard) => guard(event),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(trigger: Option<&str>) -> TransitionDef {
        TransitionDef {
            source: StateId(1),
            targets: vec![StateId(2)],
            trigger: trigger.map(str::to_string),
            guard: None,
            actions: Vec::new(),
        }
    }

    #[test]
    fn triggered_transition_matches_its_event_only() {
        let t = transition(Some("go"));
        assert!(t.matches_trigger(Some(&Event::new("go"))));
        assert!(!t.matches_trigger(Some(&Event::new("stop"))));
        assert!(!t.matches_trigger(None));
    }

    #[test]
    fn eventless_transition_matches_only_the_eventless_pass() {
        let t = transition(None);
        assert!(t.matches_trigger(None));
        assert!(!t.matches_trigger(Some(&Event::new("go"))));
    }

    #[test]
    fn missing_guard_always_passes() {
        let t = transition(Some("go"));
        assert_eq!(t.guard_passes(&Event::new("go")), Ok(true));
    }

    #[test]
    fn guard_sees_the_triggering_event() {
        let mut t = transition(Some("go"));
        t.guard = Some(Arc::new(|e: &Event| Ok(e.payload.as_i64() == Some(7))));
        assert_eq!(
            t.guard_passes(&Event::with_payload("go", serde_json::json!(7))),
            Ok(true)
        );
        assert_eq!(t.guard_passes(&Event::new("go")), Ok(false));
    }

    #[test]
    fn guard_fault_surfaces_as_error() {
        let mut t = transition(Some("go"));
        t.guard = Some(Arc::new(|_: &Event| Err(ActionFault::new("boom"))));
        assert_eq!(
            t.guard_passes(&Event::new("go")),
            Err(ActionFault::new("boom"))
        );
    }
}
