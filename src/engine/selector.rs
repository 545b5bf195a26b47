//! Transition selection and conflict resolution.
//!
//! Given one event (or none, for the eventless pass) and the active
//! configuration, the selector produces the maximal conflict-free set of
//! enabled transitions: at most one firing per overlapping region, but
//! potentially many firing across disjoint parallel regions at once.

use crate::core::hierarchy;
use crate::core::transition::ActionFault;
use crate::core::{Event, StateId};
use crate::engine::machine::StateMachine;
use std::collections::HashSet;
use tracing::trace;

/// Reference to one enabled transition: its source state and the
/// transition's index within that state's document-ordered list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EnabledTransition {
    pub(crate) source: StateId,
    pub(crate) index: usize,
}

impl StateMachine {
    /// Select the conflict-free enabled set for `event` (`None` selects
    /// eventless transitions).
    ///
    /// Per active atomic leaf, the walk goes upward through proper
    /// ancestors, innermost first, taking the first transition whose
    /// trigger matches and whose guard passes; the walk stops at the
    /// first match. Candidates merge across leaves, then conflicts are
    /// resolved: when exit sets intersect, the deeper source preempts,
    /// with document order breaking equal-depth ties.
    ///
    /// A guard fault aborts selection and is reported with the state it
    /// occurred on.
    pub(crate) fn select_transitions(
        &self,
        event: Option<&Event>,
    ) -> Result<Vec<EnabledTransition>, (StateId, ActionFault)> {
        let placeholder;
        let guard_event = match event {
            Some(e) => e,
            None => {
                placeholder = Event::eventless();
                &placeholder
            }
        };

        let mut leaves: Vec<StateId> = self
            .configuration
            .iter()
            .copied()
            .filter(|&s| {
                !self
                    .graph
                    .children_of(s)
                    .iter()
                    .any(|c| self.configuration.contains(c))
            })
            .collect();
        leaves.sort_unstable();

        let mut candidates: Vec<EnabledTransition> = Vec::new();
        for leaf in leaves {
            'walk: for state in
                std::iter::once(leaf).chain(hierarchy::proper_ancestors(&self.graph, leaf, None))
            {
                for (index, transition) in self.graph.node(state).transitions.iter().enumerate() {
                    if !transition.matches_trigger(event) {
                        continue;
                    }
                    match transition.guard_passes(guard_event) {
                        Ok(true) => {
                            let candidate = EnabledTransition { source: state, index };
                            if !candidates.contains(&candidate) {
                                candidates.push(candidate);
                            }
                            break 'walk;
                        }
                        // First passing guard wins; a failing guard falls
                        // through to the next transition on this state.
                        Ok(false) => {}
                        Err(fault) => return Err((state, fault)),
                    }
                }
            }
        }

        // Preemption: resolve in priority order (deeper source first,
        // document order as tiebreak), keeping a candidate only when its
        // exit set is disjoint from everything already kept.
        candidates.sort_by(|a, b| {
            hierarchy::depth(&self.graph, b.source)
                .cmp(&hierarchy::depth(&self.graph, a.source))
                .then(a.source.cmp(&b.source))
                .then(a.index.cmp(&b.index))
        });

        let mut selected: Vec<EnabledTransition> = Vec::new();
        let mut selected_exits: Vec<HashSet<StateId>> = Vec::new();
        for candidate in candidates {
            let exits = self.exit_set_for(candidate);
            if selected_exits.iter().any(|kept| !kept.is_disjoint(&exits)) {
                trace!(
                    source = self.graph.node(candidate.source).name.as_str(),
                    "transition preempted by deeper conflicting transition"
                );
                continue;
            }
            selected.push(candidate);
            selected_exits.push(exits);
        }

        // Execution order is document order of the source states.
        selected.sort_by(|a, b| a.source.cmp(&b.source).then(a.index.cmp(&b.index)));
        Ok(selected)
    }

    /// Active states exited if this transition fires: the configuration's
    /// descendants of the transition domain. Empty for targetless
    /// transitions, which exit nothing.
    pub(crate) fn exit_set_for(&self, enabled: EnabledTransition) -> HashSet<StateId> {
        let transition = &self.graph.node(enabled.source).transitions[enabled.index];
        if transition.targets().is_empty() {
            return HashSet::new();
        }
        let mut domain_states = vec![enabled.source];
        domain_states.extend_from_slice(transition.targets());
        let domain = hierarchy::transition_domain(&self.graph, &domain_states);
        self.configuration
            .iter()
            .copied()
            .filter(|&s| hierarchy::is_descendant_of(&self.graph, s, domain))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, TransitionBuilder};

    #[test]
    fn first_matching_guard_wins_among_same_source_transitions() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let a = b.atomic("a", root).unwrap();
        let blocked = b.atomic("blocked", root).unwrap();
        let taken = b.atomic("taken", root).unwrap();
        b.initial(root, a).unwrap();
        b.transition(
            a,
            TransitionBuilder::new().on("go").when(|_| false).target(blocked),
        )
        .unwrap();
        b.transition(a, TransitionBuilder::new().on("go").target(taken))
            .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        m.dispatch(Event::new("go"));
        assert!(m.is_active(taken));
        assert!(!m.is_active(blocked));
    }

    #[test]
    fn inner_transition_preempts_outer_on_the_same_event() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let outer = b.compound("outer", root).unwrap();
        let inner = b.atomic("inner", outer).unwrap();
        let inner2 = b.atomic("inner2", outer).unwrap();
        let elsewhere = b.atomic("elsewhere", root).unwrap();
        b.initial(root, outer).unwrap();
        b.initial(outer, inner).unwrap();
        // Outer handler appears first in document order but loses to the
        // deeper source.
        b.transition(outer, TransitionBuilder::new().on("go").target(elsewhere))
            .unwrap();
        b.transition(inner, TransitionBuilder::new().on("go").target(inner2))
            .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        m.dispatch(Event::new("go"));
        assert!(m.is_active(inner2));
        assert!(!m.is_active(elsewhere));
    }

    #[test]
    fn ancestor_transition_fires_when_leaf_has_none() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let outer = b.compound("outer", root).unwrap();
        let inner = b.atomic("inner", outer).unwrap();
        let elsewhere = b.atomic("elsewhere", root).unwrap();
        b.initial(root, outer).unwrap();
        b.initial(outer, inner).unwrap();
        b.transition(outer, TransitionBuilder::new().on("escape").target(elsewhere))
            .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        m.dispatch(Event::new("escape"));
        assert!(m.is_active(elsewhere));
        assert!(!m.is_active(outer));
    }

    #[test]
    fn disjoint_parallel_regions_fire_simultaneously() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let p = b.parallel("p", root).unwrap();
        let r1 = b.compound("r1", p).unwrap();
        let r1a = b.atomic("r1a", r1).unwrap();
        let r1b = b.atomic("r1b", r1).unwrap();
        let r2 = b.compound("r2", p).unwrap();
        let r2a = b.atomic("r2a", r2).unwrap();
        let r2b = b.atomic("r2b", r2).unwrap();
        b.initial(root, p).unwrap();
        b.initial(r1, r1a).unwrap();
        b.initial(r2, r2a).unwrap();
        b.transition(r1a, TransitionBuilder::new().on("step").target(r1b))
            .unwrap();
        b.transition(r2a, TransitionBuilder::new().on("step").target(r2b))
            .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        m.dispatch(Event::new("step"));
        assert!(m.is_active(r1b));
        assert!(m.is_active(r2b));
    }

    #[test]
    fn same_source_candidates_resolve_by_document_order() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let a = b.atomic("a", root).unwrap();
        let first = b.atomic("first", root).unwrap();
        let second = b.atomic("second", root).unwrap();
        b.initial(root, a).unwrap();
        // Same source, same trigger, both unguarded: the walk takes the
        // first in document order.
        b.transition(a, TransitionBuilder::new().on("go").target(first))
            .unwrap();
        b.transition(a, TransitionBuilder::new().on("go").target(second))
            .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        m.dispatch(Event::new("go"));
        assert!(m.is_active(first));
        assert!(!m.is_active(second));
    }

    #[test]
    fn equal_depth_conflict_resolves_by_document_order() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let p = b.parallel("p", root).unwrap();
        let r1 = b.compound("r1", p).unwrap();
        let r1a = b.atomic("r1a", r1).unwrap();
        let r2 = b.compound("r2", p).unwrap();
        let r2a = b.atomic("r2a", r2).unwrap();
        let first_exit = b.atomic("first_exit", root).unwrap();
        let second_exit = b.atomic("second_exit", root).unwrap();
        b.initial(root, p).unwrap();
        b.initial(r1, r1a).unwrap();
        b.initial(r2, r2a).unwrap();
        // Both sources sit at the same depth and both exit the whole
        // parallel, so the sets conflict; the earlier source wins.
        b.transition(r1a, TransitionBuilder::new().on("go").target(first_exit))
            .unwrap();
        b.transition(r2a, TransitionBuilder::new().on("go").target(second_exit))
            .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        m.dispatch(Event::new("go"));
        assert!(m.is_active(first_exit));
        assert!(!m.is_active(second_exit));
    }

    #[test]
    fn deeper_source_wins_conflict_regardless_of_document_order() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let p = b.parallel("p", root).unwrap();
        // Document order: r1 (and its escape transition) comes first.
        let r1 = b.compound("r1", p).unwrap();
        let r1a = b.atomic("r1a", r1).unwrap();
        let r2 = b.compound("r2", p).unwrap();
        let nested = b.compound("nested", r2).unwrap();
        let n1 = b.atomic("n1", nested).unwrap();
        let n2 = b.atomic("n2", nested).unwrap();
        let out = b.atomic("out", root).unwrap();
        b.initial(root, p).unwrap();
        b.initial(r1, r1a).unwrap();
        b.initial(r2, nested).unwrap();
        b.initial(nested, n1).unwrap();
        // r1a's transition leaves the whole parallel: its exit set covers
        // every active descendant of root, including nested's states.
        b.transition(r1a, TransitionBuilder::new().on("go").target(out))
            .unwrap();
        // n1's transition stays inside nested; its source is deeper.
        b.transition(n1, TransitionBuilder::new().on("go").target(n2))
            .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        m.dispatch(Event::new("go"));
        // The deeper transition fired; the escape was preempted.
        assert!(m.is_active(n2));
        assert!(m.is_active(r1a));
        assert!(!m.is_active(out));
    }

    #[test]
    fn targetless_transition_runs_actions_without_exiting() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let mut b = MachineBuilder::new();
        let root = b.root();
        let a = b.atomic("a", root).unwrap();
        b.initial(root, a).unwrap();
        b.transition(
            a,
            TransitionBuilder::new()
                .on("ping")
                .action(move |_| flag.store(true, Ordering::SeqCst)),
        )
        .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        let before = m.configuration();
        m.dispatch(Event::new("ping"));
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(m.configuration(), before, "no state exited or entered");
    }

    #[test]
    fn guard_fault_aborts_selection_and_is_recorded() {
        let mut b = MachineBuilder::new();
        let root = b.root();
        let a = b.atomic("a", root).unwrap();
        let bb = b.atomic("b", root).unwrap();
        b.initial(root, a).unwrap();
        b.transition(
            a,
            TransitionBuilder::new()
                .on("go")
                .when_fallible(|_| Err(ActionFault::new("guard exploded")))
                .target(bb),
        )
        .unwrap();

        let mut m = b.build().unwrap();
        m.start().unwrap();
        m.dispatch(Event::new("go"));
        // No error state declared anywhere: fatal halt.
        assert!(!m.is_running());
        assert!(m.error_string().contains("guard exploded"));
    }
}
