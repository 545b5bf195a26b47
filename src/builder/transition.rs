//! Builder for statechart transitions.

use crate::core::transition::{ActionFault, ActionFn, GuardFn, TransitionDef};
use crate::core::{Event, StateId};
use std::sync::Arc;

/// Fluent builder for a single transition.
///
/// All parts are optional: a transition with no trigger is eventless, a
/// transition with no targets is targetless (its actions run without
/// exiting or entering any state), and a missing guard always passes.
/// The source state is supplied when the transition is attached via
/// [`MachineBuilder::transition`](crate::builder::MachineBuilder::transition).
///
/// # Example
///
/// ```rust
/// use microstep::builder::{MachineBuilder, TransitionBuilder};
///
/// let mut b = MachineBuilder::new();
/// let root = b.root();
/// let idle = b.atomic("idle", root)?;
/// let busy = b.atomic("busy", root)?;
/// b.initial(root, idle)?;
/// b.transition(
///     idle,
///     TransitionBuilder::new().on("work.start").target(busy),
/// )?;
/// # Ok::<(), microstep::builder::BuildError>(())
/// ```
#[derive(Default)]
pub struct TransitionBuilder {
    trigger: Option<String>,
    targets: Vec<StateId>,
    guard: Option<GuardFn>,
    actions: Vec<ActionFn>,
}

impl TransitionBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trigger pattern. Omitting this yields an eventless
    /// transition, considered only while the machine stabilizes a
    /// macrostep.
    pub fn on(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Add one target state.
    pub fn target(mut self, target: StateId) -> Self {
        self.targets.push(target);
        self
    }

    /// Add several target states (fork-like transitions into parallel
    /// regions).
    pub fn targets(mut self, targets: impl IntoIterator<Item = StateId>) -> Self {
        self.targets.extend(targets);
        self
    }

    /// Guard the transition with an infallible predicate.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(move |event| Ok(predicate(event))));
        self
    }

    /// Guard the transition with a predicate that may fault. Faults are
    /// caught by the engine and routed to the nearest error state.
    pub fn when_fallible<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Event) -> Result<bool, ActionFault> + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(predicate));
        self
    }

    /// Append an infallible transition-content action.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.actions.push(Arc::new(move |event| {
            action(event);
            Ok(())
        }));
        self
    }

    /// Append an action that may fault.
    pub fn try_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Event) -> Result<(), ActionFault> + Send + Sync + 'static,
    {
        self.actions.push(Arc::new(action));
        self
    }

    pub(crate) fn into_def(self, source: StateId) -> TransitionDef {
        TransitionDef {
            source,
            targets: self.targets,
            trigger: self.trigger,
            guard: self.guard,
            actions: self.actions,
        }
    }
}
