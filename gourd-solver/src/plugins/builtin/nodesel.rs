//! The builtin node selectors: best-bound search and depth-first search.

use std::cmp::Ordering;

use crate::plugins::Named;
use crate::plugins::NodeSel;
use crate::tree::NodeId;
use crate::tree::Tree;

pub const BESTBOUND_NAME: &str = "bestbound";
pub const DFS_NAME: &str = "dfs";

/// Processes the open node with the weakest lower bound first; minimises the number of nodes
/// needed to prove optimality.
#[derive(Debug, Default)]
pub struct BestBoundSel;

impl Named for BestBoundSel {
    fn name(&self) -> &str {
        BESTBOUND_NAME
    }

    fn description(&self) -> &str {
        "best-bound-first search"
    }

    fn priority(&self) -> i32 {
        100000
    }
}

impl NodeSel for BestBoundSel {
    fn compare(&self, tree: &Tree, a: NodeId, b: NodeId) -> Ordering {
        tree.node(a)
            .lower_bound
            .total_cmp(&tree.node(b).lower_bound)
            .then_with(|| tree.node(b).depth.cmp(&tree.node(a).depth))
            .then(a.cmp(&b))
    }
}

/// Processes the deepest open node first; finds feasible solutions quickly and keeps the
/// open list small.
#[derive(Debug, Default)]
pub struct DfsSel;

impl Named for DfsSel {
    fn name(&self) -> &str {
        DFS_NAME
    }

    fn description(&self) -> &str {
        "depth-first search"
    }

    fn priority(&self) -> i32 {
        0
    }
}

impl NodeSel for DfsSel {
    fn compare(&self, tree: &Tree, a: NodeId, b: NodeId) -> Ordering {
        tree.node(b)
            .depth
            .cmp(&tree.node(a).depth)
            .then(b.cmp(&a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::StorageKey;
    use crate::model::VarId;
    use crate::num::Tolerances;

    fn tree_with_two_children() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::default();
        let tol = Tolerances::default();
        let (down, up) =
            tree.branch_frac(VarId::create_from_index(0), 1.5, true, 0.0, 0.0, &tol);
        tree.node_mut(down).lower_bound = 5.0;
        tree.node_mut(up).lower_bound = 2.0;
        (tree, down, up)
    }

    #[test]
    fn best_bound_prefers_the_weaker_bound() {
        let (tree, _down, up) = tree_with_two_children();
        let mut sel = BestBoundSel;
        assert_eq!(Some(up), sel.select(&tree));
    }

    #[test]
    fn dfs_prefers_the_deepest_node() {
        let (mut tree, down, _up) = tree_with_two_children();
        let tol = Tolerances::default();
        let _ = tree.switch_focus(down);
        let _ = tree.branch_frac(VarId::create_from_index(0), 0.5, true, 5.0, 0.0, &tol);

        let mut sel = DfsSel;
        let selected = sel.select(&tree).unwrap();
        assert_eq!(2, tree.node(selected).depth);
    }
}
