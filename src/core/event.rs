//! Events and trigger-pattern matching.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name prefix of machine-generated region-completion events.
pub const DONE_STATE_PREFIX: &str = "done.state.";

/// An opaque trigger: a dotted name plus an arbitrary JSON payload.
///
/// Events are transient; each external event is consumed by exactly one
/// dequeue, each internal event by exactly one microstep cycle.
///
/// # Example
///
/// ```rust
/// use microstep::core::Event;
/// use serde_json::json;
///
/// let plain = Event::new("door.open");
/// let with_payload = Event::with_payload("door.open", json!({ "by": "keycard" }));
/// assert_eq!(plain.name, with_payload.name);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Dotted event name matched against transition triggers.
    pub name: String,
    /// Free-form payload, available to guards and actions.
    pub payload: Value,
}

impl Event {
    /// Create an event with an empty payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
        }
    }

    /// Create an event carrying a payload.
    pub fn with_payload(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// The placeholder passed to guards and actions during the eventless
    /// selection pass.
    pub(crate) fn eventless() -> Self {
        Self {
            name: String::new(),
            payload: Value::Null,
        }
    }

    /// Machine-generated completion event for a region.
    pub(crate) fn done_state(region_name: &str) -> Self {
        Self::new(format!("{DONE_STATE_PREFIX}{region_name}"))
    }

    /// Whether this is a machine-generated region-completion event.
    pub fn is_done_state(&self) -> bool {
        self.name.starts_with(DONE_STATE_PREFIX)
    }
}

/// Token-prefix trigger matching.
///
/// A trigger matches an event whose name equals it exactly or extends it
/// at a dot boundary, so `"done.state"` matches `"done.state.r1"` but not
/// `"done.statement"`. The wildcard `"*"` matches every named event.
pub(crate) fn trigger_matches(trigger: &str, event_name: &str) -> bool {
    if trigger == "*" {
        return !event_name.is_empty();
    }
    if event_name == trigger {
        return true;
    }
    event_name.len() > trigger.len()
        && event_name.starts_with(trigger)
        && event_name.as_bytes()[trigger.len()] == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_name_matches() {
        assert!(trigger_matches("go", "go"));
        assert!(!trigger_matches("go", "stop"));
    }

    #[test]
    fn dot_prefix_matches() {
        assert!(trigger_matches("done.state", "done.state.r1"));
        assert!(trigger_matches("done", "done.state.r1"));
        assert!(!trigger_matches("done.state", "done.statement"));
    }

    #[test]
    fn wildcard_matches_any_named_event() {
        assert!(trigger_matches("*", "anything"));
        assert!(!trigger_matches("*", ""));
    }

    #[test]
    fn done_state_events_are_recognizable() {
        let done = Event::done_state("r1");
        assert_eq!(done.name, "done.state.r1");
        assert!(done.is_done_state());
        assert!(!Event::new("go").is_done_state());
    }

    #[test]
    fn eventless_placeholder_matches_nothing() {
        let placeholder = Event::eventless();
        assert!(!trigger_matches("go", &placeholder.name));
        assert!(!trigger_matches("*", &placeholder.name));
    }

    #[test]
    fn events_round_trip_through_serde() {
        let event = Event::with_payload("alarm", json!({ "level": 3 }));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
