//! Arena-backed state graph.
//!
//! The graph owns every state node in a flat slab; parent/child links are
//! indices into that slab, so deep hierarchies never create ownership
//! cycles. Document order is the order of node creation, which means a
//! parent's index is always smaller than the indices of its descendants.

use crate::core::transition::TransitionDef;
use crate::properties::StateAssignment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a state node within its owning [`StateGraph`].
///
/// Ids are assigned in document order: the root is always id 0, and every
/// state's id is strictly greater than its parent's.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// Raw slab index of this state.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The structural kind of a state node.
///
/// States form a tagged variant rather than a class hierarchy, so every
/// structural question is an exhaustive match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateKind {
    /// A leaf state with no children.
    Atomic,
    /// A state whose children are mutually exclusive; exactly one child is
    /// active whenever the compound itself is active. `initial` names the
    /// child entered by default.
    Compound {
        /// Default child entered when the compound is entered without an
        /// explicit descendant target.
        initial: Option<StateId>,
    },
    /// A state whose children are concurrent regions; all children are
    /// active whenever the parallel itself is active.
    Parallel,
    /// A terminal state. Entering one signals region completion to the
    /// parent.
    Final,
}

impl StateKind {
    /// Whether this kind may own children.
    pub fn is_composite(&self) -> bool {
        matches!(self, StateKind::Compound { .. } | StateKind::Parallel)
    }
}

/// One node in the state graph.
pub struct StateNode {
    pub(crate) id: StateId,
    pub(crate) name: String,
    pub(crate) kind: StateKind,
    pub(crate) parent: Option<StateId>,
    pub(crate) children: Vec<StateId>,
    pub(crate) error_state: Option<StateId>,
    pub(crate) transitions: Vec<TransitionDef>,
    pub(crate) assignments: Vec<StateAssignment>,
}

impl StateNode {
    /// The node's id.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// The authoring-time name of the state.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The structural kind.
    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    /// The parent state, `None` only for the root.
    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    /// Children in document order.
    pub fn children(&self) -> &[StateId] {
        &self.children
    }
}

/// The static tree of states and their transitions.
///
/// Built once through [`MachineBuilder`](crate::builder::MachineBuilder)
/// and immutable for the life of the machine instance.
pub struct StateGraph {
    nodes: Vec<StateNode>,
}

impl StateGraph {
    /// Id of the root state. The root always exists and is node 0.
    pub const ROOT: StateId = StateId(0);

    pub(crate) fn with_root(name: impl Into<String>) -> Self {
        let root = StateNode {
            id: Self::ROOT,
            name: name.into(),
            kind: StateKind::Compound { initial: None },
            parent: None,
            children: Vec::new(),
            error_state: None,
            transitions: Vec::new(),
            assignments: Vec::new(),
        };
        Self { nodes: vec![root] }
    }

    pub(crate) fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: StateId,
        kind: StateKind,
    ) -> StateId {
        let id = StateId(self.nodes.len());
        self.nodes.push(StateNode {
            id,
            name: name.into(),
            kind,
            parent: Some(parent),
            children: Vec::new(),
            error_state: None,
            transitions: Vec::new(),
            assignments: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn node(&self, id: StateId) -> &StateNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: StateId) -> &mut StateNode {
        &mut self.nodes[id.0]
    }

    /// Whether `id` names a state in this graph.
    pub fn contains(&self, id: StateId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Number of states, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A graph always holds at least the root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Name of a state, if it exists.
    pub fn name_of(&self, id: StateId) -> Option<&str> {
        self.nodes.get(id.0).map(|n| n.name.as_str())
    }

    /// Kind of a state, if it exists.
    pub fn kind_of(&self, id: StateId) -> Option<&StateKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    /// Parent of a state; `None` for the root or unknown ids.
    pub fn parent_of(&self, id: StateId) -> Option<StateId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Children of a state in document order; empty for unknown ids.
    pub fn children_of(&self, id: StateId) -> &[StateId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Find a state by its authoring name. Names are not required to be
    /// unique; the first match in document order wins.
    pub fn state_by_name(&self, name: &str) -> Option<StateId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    /// Iterate all nodes in document order.
    pub fn states(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes.iter()
    }
}
