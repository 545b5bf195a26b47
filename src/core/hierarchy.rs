//! Ancestor and domain queries over the static state graph.
//!
//! These are the structural primitives the selector and microstep engine
//! are built on: least-common-ancestor computation, proper-ancestor
//! chains, descendant tests, and the entry/exit orderings.
//!
//! Ordering is a hard correctness requirement. Exiting a parent before its
//! children, or entering a child before its parent, corrupts restorable
//! bookkeeping and active-state signaling. Arena ids are assigned in
//! document order with parents preceding descendants, so ascending id is a
//! valid entry order and descending id is the exact reverse, which is the
//! exit order.

use crate::core::graph::{StateGraph, StateId, StateKind};
use std::collections::HashSet;

/// Distance from the root. The root has depth 0.
pub fn depth(graph: &StateGraph, state: StateId) -> usize {
    let mut d = 0;
    let mut cur = state;
    while let Some(p) = graph.parent_of(cur) {
        d += 1;
        cur = p;
    }
    d
}

/// Strict ancestors of `state`, innermost first, stopping before
/// `upper_bound` (exclusive). With `None` the chain runs to the root.
pub fn proper_ancestors(
    graph: &StateGraph,
    state: StateId,
    upper_bound: Option<StateId>,
) -> Vec<StateId> {
    let mut chain = Vec::new();
    let mut cur = state;
    while let Some(p) = graph.parent_of(cur) {
        if Some(p) == upper_bound {
            break;
        }
        chain.push(p);
        cur = p;
    }
    chain
}

/// Whether `state` is a strict descendant of `other`.
pub fn is_descendant_of(graph: &StateGraph, state: StateId, other: StateId) -> bool {
    let mut cur = state;
    while let Some(p) = graph.parent_of(cur) {
        if p == other {
            return true;
        }
        cur = p;
    }
    false
}

/// Whether the state is an atomic leaf.
pub fn is_atomic(graph: &StateGraph, state: StateId) -> bool {
    matches!(graph.kind_of(state), Some(StateKind::Atomic))
}

/// Whether the state is a compound (exclusive-children) state.
pub fn is_compound(graph: &StateGraph, state: StateId) -> bool {
    matches!(graph.kind_of(state), Some(StateKind::Compound { .. }))
}

/// Whether the state is a parallel (concurrent-regions) state.
pub fn is_parallel(graph: &StateGraph, state: StateId) -> bool {
    matches!(graph.kind_of(state), Some(StateKind::Parallel))
}

/// Whether the state is a final state.
pub fn is_final(graph: &StateGraph, state: StateId) -> bool {
    matches!(graph.kind_of(state), Some(StateKind::Final))
}

/// Least common ancestor of a non-empty set of states: the innermost
/// composite state that is a strict ancestor of every member. Falls back
/// to the root when no tighter ancestor exists.
///
/// Deterministic and independent of input order: the result is on every
/// member's ancestor chain, so walking the first member's chain and
/// checking the rest yields the same answer for any permutation.
pub fn find_lca(graph: &StateGraph, states: &[StateId]) -> StateId {
    let Some((&first, rest)) = states.split_first() else {
        return StateGraph::ROOT;
    };
    for anc in proper_ancestors(graph, first, None) {
        if rest.iter().all(|&s| is_descendant_of(graph, s, anc)) {
            return anc;
        }
    }
    StateGraph::ROOT
}

/// Domain of a transition: the innermost *compound* ancestor common to
/// every member. Parallel ancestors are never a domain — a transition
/// crossing between sibling regions must exit the whole parallel so that
/// every region is re-entered, keeping all regions of an active parallel
/// active. Falls back to the root.
pub fn transition_domain(graph: &StateGraph, states: &[StateId]) -> StateId {
    let Some((&first, rest)) = states.split_first() else {
        return StateGraph::ROOT;
    };
    for anc in proper_ancestors(graph, first, None) {
        if is_parallel(graph, anc) {
            continue;
        }
        if rest.iter().all(|&s| is_descendant_of(graph, s, anc)) {
            return anc;
        }
    }
    StateGraph::ROOT
}

/// Sort a set of states into entry order: ancestors before descendants,
/// siblings in document order.
pub fn entry_ordered(_graph: &StateGraph, states: &HashSet<StateId>) -> Vec<StateId> {
    let mut ordered: Vec<StateId> = states.iter().copied().collect();
    ordered.sort_unstable();
    ordered
}

/// Sort a set of states into exit order: the exact reverse of entry
/// order, so children always exit before their parents.
pub fn exit_ordered(_graph: &StateGraph, states: &HashSet<StateId>) -> Vec<StateId> {
    let mut ordered: Vec<StateId> = states.iter().copied().collect();
    ordered.sort_unstable_by(|a, b| b.cmp(a));
    ordered
}
