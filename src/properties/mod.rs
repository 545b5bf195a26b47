//! Property assignments, restorables, and the animation bridge.
//!
//! States may declare property assignments that the engine applies on
//! entry. Under [`RestorePolicy::RestoreProperties`] the engine records
//! the prior value the first time a running machine assigns a property
//! and restores it when the declaring state exits. Assignments may
//! optionally be routed through a time-based animation: the engine starts
//! the animation via an injected [`AnimationDriver`] and finalizes the
//! value when the driver reports completion. The engine never owns
//! animation timing math; it only starts, stops, and waits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// A `(target, property, value)` assignment declared for a state.
///
/// # Example
///
/// ```rust
/// use microstep::properties::PropertyAssignment;
/// use serde_json::json;
///
/// let assignment = PropertyAssignment::new("lamp", "brightness", json!(80));
/// assert_eq!(assignment.target, "lamp");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyAssignment {
    /// Name of the object being assigned.
    pub target: String,
    /// Property of the target.
    pub property: String,
    /// Value written on entry.
    pub value: Value,
}

impl PropertyAssignment {
    /// Create an assignment.
    pub fn new(
        target: impl Into<String>,
        property: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            target: target.into(),
            property: property.into(),
            value,
        }
    }

    pub(crate) fn restorable_id(&self) -> RestorableId {
        RestorableId {
            target: self.target.clone(),
            property: self.property.clone(),
        }
    }
}

/// An assignment as registered on a state, with its animation flag.
#[derive(Clone, Debug)]
pub(crate) struct StateAssignment {
    pub(crate) assignment: PropertyAssignment,
    pub(crate) animated: bool,
}

/// Policy controlling whether exited states restore prior property values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestorePolicy {
    /// Never record or restore prior values.
    #[default]
    DontRestore,
    /// Record the prior value on first assignment and restore it when the
    /// declaring state exits.
    RestoreProperties,
}

/// Key of a recorded restorable: the assigned `(target, property)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RestorableId {
    pub(crate) target: String,
    pub(crate) property: String,
}

/// In-memory key/value surface the engine assigns through.
///
/// This stands in for whatever object tree the host application exposes;
/// the engine only ever reads prior values and writes new ones.
#[derive(Clone, Debug, Default)]
pub struct PropertyStore {
    values: HashMap<RestorableId, Value>,
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a property; unset properties read as `Value::Null`.
    pub fn get(&self, target: &str, property: &str) -> Value {
        let key = RestorableId {
            target: target.to_string(),
            property: property.to_string(),
        };
        self.values.get(&key).cloned().unwrap_or(Value::Null)
    }

    /// Write a property.
    pub fn set(&mut self, target: impl Into<String>, property: impl Into<String>, value: Value) {
        let key = RestorableId {
            target: target.into(),
            property: property.into(),
        };
        self.values.insert(key, value);
    }

    pub(crate) fn apply(&mut self, assignment: &PropertyAssignment) {
        self.values
            .insert(assignment.restorable_id(), assignment.value.clone());
    }
}

/// Handle for one in-flight animation started by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimationToken(Uuid);

impl AnimationToken {
    pub(crate) fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Failure to start an animation.
///
/// Never fatal: the engine degrades to a synchronous assignment.
#[derive(Debug, Error)]
pub enum AnimationError {
    /// The driver could not start the animation.
    #[error("animation failed to start: {0}")]
    StartFailed(String),
}

/// Strategy object that runs time-based animations on the engine's behalf.
///
/// Injected at construction via
/// [`MachineBuilder::animation_driver`](crate::builder::MachineBuilder::animation_driver).
/// When an animated assignment's state is entered the engine calls
/// [`start`](AnimationDriver::start); the host later reports completion
/// through [`StateMachine::animation_finished`](crate::engine::StateMachine::animation_finished)
/// with the same token. If the state exits while the animation is still
/// running the engine calls [`stop`](AnimationDriver::stop).
pub trait AnimationDriver: Send {
    /// Begin animating `assignment`, identified by `token`.
    fn start(
        &mut self,
        token: AnimationToken,
        assignment: &PropertyAssignment,
    ) -> Result<(), AnimationError>;

    /// Cancel an in-flight animation.
    fn stop(&mut self, token: AnimationToken);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_property_reads_as_null() {
        let store = PropertyStore::new();
        assert_eq!(store.get("obj", "x"), Value::Null);
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut store = PropertyStore::new();
        store.set("obj", "x", json!(5));
        assert_eq!(store.get("obj", "x"), json!(5));
        assert_eq!(store.get("obj", "y"), Value::Null);
    }

    #[test]
    fn apply_writes_the_assignment_value() {
        let mut store = PropertyStore::new();
        let assignment = PropertyAssignment::new("obj", "x", json!("lit"));
        store.apply(&assignment);
        assert_eq!(store.get("obj", "x"), json!("lit"));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(AnimationToken::mint(), AnimationToken::mint());
    }

    #[test]
    fn restorable_id_keys_on_target_and_property() {
        let a = PropertyAssignment::new("obj", "x", json!(1));
        let b = PropertyAssignment::new("obj", "x", json!(2));
        assert_eq!(a.restorable_id(), b.restorable_id());
    }
}
