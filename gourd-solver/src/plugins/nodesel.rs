//! The node selector interface.

use std::cmp::Ordering;

use super::registry::Named;
use crate::tree::NodeId;
use crate::tree::Tree;

pub trait NodeSel: Named {
    /// Picks the next node to process from the open list.
    fn select(&mut self, tree: &Tree) -> Option<NodeId> {
        tree.open()
            .iter()
            .copied()
            .min_by(|&a, &b| self.compare(tree, a, b))
    }

    /// Total order over open nodes; `Less` means `a` should be processed before `b`.
    fn compare(&self, tree: &Tree, a: NodeId, b: NodeId) -> Ordering;
}
