//! Builder for constructing statechart machines.

use crate::builder::error::BuildError;
use crate::builder::transition::TransitionBuilder;
use crate::core::graph::{StateGraph, StateId, StateKind};
use crate::core::hierarchy;
use crate::engine::StateMachine;
use crate::properties::{
    AnimationDriver, PropertyAssignment, PropertyStore, RestorePolicy, StateAssignment,
};
use serde_json::Value;

/// Fluent builder for a [`StateMachine`].
///
/// The builder starts with an implicit compound root. States are created
/// top-down (a parent must exist before its children), which fixes
/// document order; transitions, property assignments, and machine-wide
/// policy are attached afterwards. `build` validates the whole graph
/// eagerly, so a machine that builds successfully never fails
/// structurally at runtime.
///
/// # Example
///
/// ```rust
/// use microstep::builder::{MachineBuilder, TransitionBuilder};
/// use microstep::core::Event;
///
/// let mut b = MachineBuilder::new();
/// let root = b.root();
/// let red = b.atomic("red", root)?;
/// let green = b.atomic("green", root)?;
/// b.initial(root, red)?;
/// b.transition(red, TransitionBuilder::new().on("tick").target(green))?;
/// b.transition(green, TransitionBuilder::new().on("tick").target(red))?;
///
/// let mut machine = b.build()?;
/// machine.start()?;
/// machine.dispatch(Event::new("tick"));
/// assert!(machine.is_active(green));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct MachineBuilder {
    graph: StateGraph,
    restore_policy: RestorePolicy,
    store: PropertyStore,
    driver: Option<Box<dyn AnimationDriver>>,
}

impl MachineBuilder {
    /// Create a builder whose root is a compound state named `"root"`.
    pub fn new() -> Self {
        Self {
            graph: StateGraph::with_root("root"),
            restore_policy: RestorePolicy::default(),
            store: PropertyStore::new(),
            driver: None,
        }
    }

    /// Id of the implicit root state.
    pub fn root(&self) -> StateId {
        StateGraph::ROOT
    }

    fn add_state(
        &mut self,
        name: impl Into<String>,
        parent: StateId,
        kind: StateKind,
    ) -> Result<StateId, BuildError> {
        if !self.graph.contains(parent) {
            return Err(BuildError::UnknownState(parent));
        }
        if !self.graph.node(parent).kind.is_composite() {
            return Err(BuildError::ParentNotComposite {
                parent: self.graph.node(parent).name.clone(),
            });
        }
        Ok(self.graph.add_node(name, parent, kind))
    }

    /// Add an atomic (leaf) state.
    pub fn atomic(
        &mut self,
        name: impl Into<String>,
        parent: StateId,
    ) -> Result<StateId, BuildError> {
        self.add_state(name, parent, StateKind::Atomic)
    }

    /// Add a compound state. Designate its default child with
    /// [`initial`](Self::initial) once the children exist.
    pub fn compound(
        &mut self,
        name: impl Into<String>,
        parent: StateId,
    ) -> Result<StateId, BuildError> {
        self.add_state(name, parent, StateKind::Compound { initial: None })
    }

    /// Add a parallel state whose children are concurrent regions.
    pub fn parallel(
        &mut self,
        name: impl Into<String>,
        parent: StateId,
    ) -> Result<StateId, BuildError> {
        self.add_state(name, parent, StateKind::Parallel)
    }

    /// Add a final state.
    pub fn final_state(
        &mut self,
        name: impl Into<String>,
        parent: StateId,
    ) -> Result<StateId, BuildError> {
        self.add_state(name, parent, StateKind::Final)
    }

    /// Declare the default child of a compound state.
    pub fn initial(&mut self, state: StateId, child: StateId) -> Result<(), BuildError> {
        if !self.graph.contains(state) {
            return Err(BuildError::UnknownState(state));
        }
        if !self.graph.contains(child) {
            return Err(BuildError::UnknownState(child));
        }
        if self.graph.parent_of(child) != Some(state) {
            return Err(BuildError::InitialNotChild {
                state: self.graph.node(state).name.clone(),
                initial: self.graph.node(child).name.clone(),
            });
        }
        match &mut self.graph.node_mut(state).kind {
            StateKind::Compound { initial } => {
                *initial = Some(child);
                Ok(())
            }
            _ => Err(BuildError::ParentNotComposite {
                parent: self.graph.node(state).name.clone(),
            }),
        }
    }

    /// Designate the error state entered when a guard or action faults
    /// while `state` (or one of its descendants) is involved. The nearest
    /// declaring ancestor wins.
    pub fn error_state(&mut self, state: StateId, handler: StateId) -> Result<(), BuildError> {
        if !self.graph.contains(state) {
            return Err(BuildError::UnknownState(state));
        }
        if !self.graph.contains(handler) {
            return Err(BuildError::UnknownState(handler));
        }
        if hierarchy::is_descendant_of(&self.graph, state, handler) {
            return Err(BuildError::ErrorStateIsAncestor {
                state: self.graph.node(state).name.clone(),
                error_state: self.graph.node(handler).name.clone(),
            });
        }
        self.graph.node_mut(state).error_state = Some(handler);
        Ok(())
    }

    /// Attach a transition to its source state. Transitions attached to
    /// the same state keep document order, which is their priority order.
    pub fn transition(
        &mut self,
        source: StateId,
        builder: TransitionBuilder,
    ) -> Result<(), BuildError> {
        if !self.graph.contains(source) {
            return Err(BuildError::UnknownState(source));
        }
        if matches!(self.graph.node(source).kind, StateKind::Final) {
            return Err(BuildError::TransitionFromFinal {
                state: self.graph.node(source).name.clone(),
            });
        }
        let def = builder.into_def(source);
        for &target in def.targets() {
            if !self.graph.contains(target) {
                return Err(BuildError::UnknownState(target));
            }
        }
        self.graph.node_mut(source).transitions.push(def);
        Ok(())
    }

    /// Declare a property assignment applied synchronously whenever
    /// `state` is entered.
    pub fn assign(
        &mut self,
        state: StateId,
        target: impl Into<String>,
        property: impl Into<String>,
        value: Value,
    ) -> Result<(), BuildError> {
        self.push_assignment(state, target, property, value, false)
    }

    /// Declare a property assignment routed through the animation driver
    /// when `state` is entered. Without a driver (or if the driver fails
    /// to start) the assignment degrades to a synchronous write.
    pub fn assign_animated(
        &mut self,
        state: StateId,
        target: impl Into<String>,
        property: impl Into<String>,
        value: Value,
    ) -> Result<(), BuildError> {
        self.push_assignment(state, target, property, value, true)
    }

    fn push_assignment(
        &mut self,
        state: StateId,
        target: impl Into<String>,
        property: impl Into<String>,
        value: Value,
        animated: bool,
    ) -> Result<(), BuildError> {
        if !self.graph.contains(state) {
            return Err(BuildError::UnknownState(state));
        }
        self.graph.node_mut(state).assignments.push(StateAssignment {
            assignment: PropertyAssignment::new(target, property, value),
            animated,
        });
        Ok(())
    }

    /// Seed an initial property value, e.g. the value a restorable should
    /// fall back to.
    pub fn property(
        &mut self,
        target: impl Into<String>,
        property: impl Into<String>,
        value: Value,
    ) {
        self.store.set(target, property, value);
    }

    /// Set the machine-wide restore policy.
    pub fn restore_policy(mut self, policy: RestorePolicy) -> Self {
        self.restore_policy = policy;
        self
    }

    /// Inject the animation driver used for animated assignments.
    pub fn animation_driver(mut self, driver: Box<dyn AnimationDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Validate the static graph and produce the machine.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        self.validate()?;
        Ok(StateMachine::from_parts(
            self.graph,
            self.restore_policy,
            self.store,
            self.driver,
        ))
    }

    fn validate(&self) -> Result<(), BuildError> {
        for node in self.graph.states() {
            match &node.kind {
                StateKind::Compound { initial } => {
                    if !node.children.is_empty() {
                        let Some(init) = initial else {
                            return Err(BuildError::MissingInitialChild {
                                state: node.name.clone(),
                            });
                        };
                        if self.graph.parent_of(*init) != Some(node.id) {
                            return Err(BuildError::InitialNotChild {
                                state: node.name.clone(),
                                initial: self.graph.node(*init).name.clone(),
                            });
                        }
                    }
                }
                StateKind::Parallel => {
                    if node.children.is_empty() {
                        return Err(BuildError::EmptyParallel {
                            state: node.name.clone(),
                        });
                    }
                }
                StateKind::Atomic | StateKind::Final => {}
            }
        }
        Ok(())
    }
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_require_composite_parent() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let leaf = b.atomic("leaf", root).unwrap();
        let result = b.atomic("child", leaf);
        assert!(matches!(result, Err(BuildError::ParentNotComposite { .. })));
    }

    #[test]
    fn final_states_cannot_own_children() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let done = b.final_state("done", root).unwrap();
        let result = b.atomic("child", done);
        assert!(matches!(result, Err(BuildError::ParentNotComposite { .. })));
    }

    #[test]
    fn compound_without_initial_is_rejected_at_build() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        b.atomic("a", root).unwrap();
        let result = b.build();
        assert!(matches!(result, Err(BuildError::MissingInitialChild { .. })));
    }

    #[test]
    fn initial_must_be_a_direct_child() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let outer = b.compound("outer", root).unwrap();
        let inner = b.atomic("inner", outer).unwrap();
        let result = b.initial(root, inner);
        assert!(matches!(result, Err(BuildError::InitialNotChild { .. })));
    }

    #[test]
    fn empty_parallel_is_rejected() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let p = b.parallel("p", root).unwrap();
        b.initial(root, p).unwrap();
        let result = b.build();
        assert!(matches!(result, Err(BuildError::EmptyParallel { .. })));
    }

    #[test]
    fn transitions_from_final_states_are_rejected() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let a = b.atomic("a", root).unwrap();
        let done = b.final_state("done", root).unwrap();
        b.initial(root, a).unwrap();
        let result = b.transition(done, TransitionBuilder::new().on("x").target(a));
        assert!(matches!(result, Err(BuildError::TransitionFromFinal { .. })));
    }

    #[test]
    fn error_state_cannot_be_an_ancestor() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let outer = b.compound("outer", root).unwrap();
        let inner = b.atomic("inner", outer).unwrap();
        b.initial(outer, inner).unwrap();
        b.initial(root, outer).unwrap();
        let result = b.error_state(inner, outer);
        assert!(matches!(result, Err(BuildError::ErrorStateIsAncestor { .. })));
    }

    #[test]
    fn well_formed_chart_builds() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let a = b.atomic("a", root).unwrap();
        let bst = b.atomic("b", root).unwrap();
        b.initial(root, a).unwrap();
        b.transition(a, TransitionBuilder::new().on("go").target(bst))
            .unwrap();
        assert!(b.build().is_ok());
    }

    #[test]
    fn bare_root_builds() {
        // A childless compound root is effectively atomic: legal.
        let b = MachineBuilder::new();
        assert!(b.build().is_ok());
    }
}
