//! One atomic exit → action → entry cycle.
//!
//! The microstep is where the ordering invariants live: exits run
//! deepest-first with restorable restoration, transition content runs in
//! document order, entries run ancestor-first with default-entry
//! resolution for compound and parallel states, and the configuration
//! commit plus final-state detection close the cycle.

use crate::core::graph::{StateGraph, StateId, StateKind};
use crate::core::hierarchy;
use crate::core::Event;
use crate::engine::error::MachineError;
use crate::engine::machine::{PendingAnimation, StateMachine};
use crate::engine::selector::EnabledTransition;
use crate::properties::{AnimationToken, RestorableId, RestorePolicy};
use crate::trace::TraceRecord;
use std::collections::HashSet;
use tracing::{trace, warn};

/// Add `targets` and everything their entry implies to `to_enter`.
///
/// Two phases, in order: first every target's descendant entries
/// (default-entry resolution — a compound contributes its initial chain,
/// a parallel contributes all regions), then the ancestor chains up to
/// and excluding `bound`. The descendant phase must complete for *all*
/// targets before any ancestor pass runs: the sibling-region cover check
/// below decides "uncovered" against the whole entry set, so a fork into
/// two regions default-enters neither of them twice.
pub(crate) fn add_states_to_enter(
    graph: &StateGraph,
    targets: &[StateId],
    bound: StateId,
    to_enter: &mut HashSet<StateId>,
) {
    for &target in targets {
        add_descendant_states_to_enter(graph, target, to_enter);
    }
    for &target in targets {
        add_ancestor_states_to_enter(graph, target, bound, to_enter);
    }
}

fn add_descendant_states_to_enter(
    graph: &StateGraph,
    state: StateId,
    to_enter: &mut HashSet<StateId>,
) {
    to_enter.insert(state);
    match graph.kind_of(state) {
        Some(StateKind::Parallel) => {
            for &child in graph.children_of(state) {
                add_descendant_states_to_enter(graph, child, to_enter);
            }
        }
        Some(StateKind::Compound { initial: Some(init) }) => {
            add_descendant_states_to_enter(graph, *init, to_enter);
        }
        _ => {}
    }
}

fn add_ancestor_states_to_enter(
    graph: &StateGraph,
    state: StateId,
    bound: StateId,
    to_enter: &mut HashSet<StateId>,
) {
    for ancestor in hierarchy::proper_ancestors(graph, state, Some(bound)) {
        to_enter.insert(ancestor);
        if hierarchy::is_parallel(graph, ancestor) {
            for &region in graph.children_of(ancestor) {
                let covered = to_enter
                    .iter()
                    .any(|&s| s == region || hierarchy::is_descendant_of(graph, s, region));
                if !covered {
                    add_descendant_states_to_enter(graph, region, to_enter);
                }
            }
        }
    }
}

impl StateMachine {
    /// Execute one microstep for the given enabled set. `event` is `None`
    /// for eventless microsteps.
    pub(crate) fn microstep(&mut self, event: Option<&Event>, enabled: &[EnabledTransition]) {
        let action_event = match event {
            Some(e) => e.clone(),
            None => Event::eventless(),
        };

        // Exit set: union of each transition domain's active descendants.
        let mut exit_set: HashSet<StateId> = HashSet::new();
        for &t in enabled {
            exit_set.extend(self.exit_set_for(t));
        }
        self.exit_states(&exit_set);

        // Transition content, in document order of the transitions.
        for &en in enabled {
            let (source_name, actions) = {
                let node = self.graph.node(en.source);
                (node.name.clone(), node.transitions[en.index].actions.clone())
            };
            for action in &actions {
                if let Err(fault) = action(&action_event) {
                    self.handle_fault(
                        MachineError::ActionFailed {
                            state: source_name.clone(),
                            fault,
                        },
                        en.source,
                    );
                    return;
                }
            }
        }

        // Entry set: explicit targets, their ancestors up to the domain,
        // and default-entry resolution. Descendant entries for every
        // transition land before any ancestor pass runs.
        let mut entries: Vec<(Vec<StateId>, StateId)> = Vec::new();
        for &en in enabled {
            let targets = self.graph.node(en.source).transitions[en.index]
                .targets()
                .to_vec();
            if targets.is_empty() {
                continue;
            }
            let mut domain_states = vec![en.source];
            domain_states.extend_from_slice(&targets);
            let domain = hierarchy::transition_domain(&self.graph, &domain_states);
            entries.push((targets, domain));
        }
        let mut to_enter: HashSet<StateId> = HashSet::new();
        for (targets, _) in &entries {
            for &target in targets {
                add_descendant_states_to_enter(&self.graph, target, &mut to_enter);
            }
        }
        for (targets, domain) in &entries {
            for &target in targets {
                add_ancestor_states_to_enter(&self.graph, target, *domain, &mut to_enter);
            }
        }
        let entry_list = hierarchy::entry_ordered(&self.graph, &to_enter);
        self.enter_states(&entry_list);
    }

    /// Exit every state in `exit_set` in exit order: restore recorded
    /// property values, cancel in-flight animations, mark inactive.
    pub(crate) fn exit_states(&mut self, exit_set: &HashSet<StateId>) {
        for state in hierarchy::exit_ordered(&self.graph, exit_set) {
            self.restore_properties_for(state);
            self.stop_animations_for(state);
            self.configuration.remove(&state);
            let name = self.graph.node(state).name.clone();
            trace!(state = name.as_str(), "exited");
            self.trace = self.trace.record(TraceRecord::exited(name));
        }
    }

    /// Enter every state in `entry_list` (already in entry order): mark
    /// active, apply property assignments, signal region completion for
    /// final states.
    pub(crate) fn enter_states(&mut self, entry_list: &[StateId]) {
        for &state in entry_list {
            self.configuration.insert(state);
            let name = self.graph.node(state).name.clone();
            trace!(state = name.as_str(), "entered");
            self.trace = self.trace.record(TraceRecord::entered(name));
            self.apply_assignments(state);
            if hierarchy::is_final(&self.graph, state) {
                self.signal_region_done(state);
            }
        }
    }

    /// Route the configuration to a declared error state after a fault.
    pub(crate) fn route_to(&mut self, context: StateId, error_state: StateId) {
        let domain = hierarchy::transition_domain(&self.graph, &[context, error_state]);
        let exit_set: HashSet<StateId> = self
            .configuration
            .iter()
            .copied()
            .filter(|&s| hierarchy::is_descendant_of(&self.graph, s, domain))
            .collect();
        self.exit_states(&exit_set);
        let mut to_enter = HashSet::new();
        add_states_to_enter(&self.graph, &[error_state], domain, &mut to_enter);
        let entry_list = hierarchy::entry_ordered(&self.graph, &to_enter);
        self.enter_states(&entry_list);
    }

    fn restore_properties_for(&mut self, state: StateId) {
        if self.restore_policy != RestorePolicy::RestoreProperties {
            return;
        }
        let ids: Vec<RestorableId> = self
            .graph
            .node(state)
            .assignments
            .iter()
            .map(|a| a.assignment.restorable_id())
            .collect();
        for id in ids {
            if let Some(prior) = self.restorables.remove(&id) {
                self.store.set(id.target, id.property, prior);
            }
        }
    }

    fn stop_animations_for(&mut self, state: StateId) {
        let tokens: Vec<AnimationToken> = self
            .pending
            .iter()
            .filter(|(_, p)| p.state == state)
            .map(|(t, _)| *t)
            .collect();
        for token in tokens {
            self.pending.remove(&token);
            if let Some(driver) = self.driver.as_mut() {
                driver.stop(token);
            }
        }
    }

    /// Apply the property assignments declared for an entered state,
    /// registering restorables first when the policy requires it. An
    /// animated assignment goes through the driver; start failure
    /// degrades to a synchronous write.
    fn apply_assignments(&mut self, state: StateId) {
        let assignments = self.graph.node(state).assignments.clone();
        for sa in assignments {
            if self.restore_policy == RestorePolicy::RestoreProperties {
                let id = sa.assignment.restorable_id();
                if !self.restorables.contains_key(&id) {
                    let prior = self.store.get(&id.target, &id.property);
                    self.restorables.insert(id, prior);
                }
            }
            if sa.animated {
                if let Some(driver) = self.driver.as_mut() {
                    let token = AnimationToken::mint();
                    match driver.start(token, &sa.assignment) {
                        Ok(()) => {
                            self.pending.insert(
                                token,
                                PendingAnimation {
                                    state,
                                    assignment: sa.assignment,
                                },
                            );
                            continue;
                        }
                        Err(err) => {
                            warn!(error = %err, "animation failed to start; applying synchronously");
                        }
                    }
                }
            }
            self.store.apply(&sa.assignment);
        }
    }

    /// An entered final state completes its region: enqueue the internal
    /// done event for the parent, and for the grandparent when it is a
    /// parallel whose regions are now all final. Root completion is
    /// detected on the whole configuration instead.
    fn signal_region_done(&mut self, final_state: StateId) {
        let Some(parent) = self.graph.parent_of(final_state) else {
            return;
        };
        if parent == StateGraph::ROOT {
            return;
        }
        let parent_name = self.graph.node(parent).name.clone();
        self.internal_queue.push_back(Event::done_state(&parent_name));
        if let Some(grandparent) = self.graph.parent_of(parent) {
            if hierarchy::is_parallel(&self.graph, grandparent)
                && self.is_in_final_state(grandparent)
            {
                let grandparent_name = self.graph.node(grandparent).name.clone();
                self.internal_queue
                    .push_back(Event::done_state(&grandparent_name));
            }
        }
    }
}
