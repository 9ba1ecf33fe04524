//! Branch-and-bound nodes.

use crate::model::BoundType;
use crate::model::ConsId;
use crate::model::VarId;
use crate::storage_key;

storage_key!(NodeId, "node");

/// A bound change attached to a node, applied when the node is activated.
#[derive(Clone, Copy, Debug)]
pub struct NodeBoundChange {
    pub var: VarId,
    pub bound: BoundType,
    pub value: f64,
}

/// One node of the branch-and-bound tree.
///
/// A node only stores the difference to its parent: the branching bound changes and any
/// constraints added locally. The full local state is materialised by walking the path from
/// the root when the node becomes the focus node.
#[derive(Clone, Debug)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub depth: usize,
    /// Dual bound inherited from the parent, tightened by the node's own LP.
    pub lower_bound: f64,
    /// Estimated objective of the best feasible solution in the subtree.
    pub estimate: f64,
    pub domchg: Vec<NodeBoundChange>,
    pub added_conss: Vec<ConsId>,
    /// Domain changes above this node changed after its creation; propagation must be
    /// repeated when it is activated.
    pub reprop: bool,
    pub cutoff: bool,
}

impl Node {
    pub fn root() -> Node {
        Node {
            parent: None,
            depth: 0,
            lower_bound: -f64::INFINITY,
            estimate: -f64::INFINITY,
            domchg: Vec::new(),
            added_conss: Vec::new(),
            reprop: false,
            cutoff: false,
        }
    }

    pub fn child_of(parent: NodeId, parent_depth: usize, lower_bound: f64, estimate: f64) -> Node {
        Node {
            parent: Some(parent),
            depth: parent_depth + 1,
            lower_bound,
            estimate,
            domchg: Vec::new(),
            added_conss: Vec::new(),
            reprop: false,
            cutoff: false,
        }
    }
}
