//! The branch-and-bound tree.
//!
//! The tree owns the node arena and the open list; the domain state of the focus node is
//! materialised elsewhere by replaying the bound changes along the path from the root.
//! Node selection itself is a plugin decision; the tree only answers structural queries.

mod node;

pub use node::Node;
pub use node::NodeBoundChange;
pub use node::NodeId;

use crate::containers::KeyedVec;
use crate::gourd_assert_simple;
use crate::model::BoundType;
use crate::model::VarId;
use crate::num::Tolerances;

/// Deepest node the tree will branch at; branching below it fails with a depth error.
pub const MAX_DEPTH: usize = 65534;

#[derive(Debug)]
pub struct Tree {
    nodes: KeyedVec<NodeId, Node>,
    root: NodeId,
    focus: NodeId,
    open: Vec<NodeId>,
    /// Nodes with a lower bound at or above this value cannot contain an improving solution.
    pub cutoff_bound: f64,
    pub n_created: u64,
    pub n_processed: u64,
}

impl Default for Tree {
    fn default() -> Self {
        let mut nodes = KeyedVec::default();
        let root = nodes.push(Node::root());
        Tree {
            nodes,
            root,
            focus: root,
            open: Vec::new(),
            cutoff_bound: f64::INFINITY,
            n_created: 1,
            n_processed: 0,
        }
    }
}

impl Tree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn focus(&self) -> NodeId {
        self.focus
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn open(&self) -> &[NodeId] {
        &self.open
    }

    pub fn n_open(&self) -> usize {
        self.open.len()
    }

    /// Creates an open child of the focus node.
    pub fn create_child(&mut self, lower_bound: f64, estimate: f64) -> NodeId {
        let depth = self.nodes[self.focus].depth;
        let child = self
            .nodes
            .push(Node::child_of(self.focus, depth, lower_bound, estimate));
        self.open.push(child);
        self.n_created += 1;
        child
    }

    fn attach_bound(&mut self, child: NodeId, var: VarId, bound: BoundType, value: f64) {
        self.nodes[child].domchg.push(NodeBoundChange { var, bound, value });
    }

    /// Two-child branching on a fractional value: down gets `var <= floor`, up `var >= ceil`
    /// (for continuous variables both children share the branching value).
    pub fn branch_frac(
        &mut self,
        var: VarId,
        value: f64,
        discrete: bool,
        lower_bound: f64,
        estimate: f64,
        tol: &Tolerances,
    ) -> (NodeId, NodeId) {
        let (down_ub, up_lb) = if discrete {
            (tol.feas_floor(value), tol.feas_ceil(value))
        } else {
            (value, value)
        };
        let down = self.create_child(lower_bound, estimate);
        self.attach_bound(down, var, BoundType::Upper, down_ub);
        let up = self.create_child(lower_bound, estimate);
        self.attach_bound(up, var, BoundType::Lower, up_lb);
        (down, up)
    }

    /// Three-child branching on an integral value of an integer variable: `var <= value - 1`,
    /// `var == value`, `var >= value + 1`.
    pub fn branch_val(
        &mut self,
        var: VarId,
        value: f64,
        lower_bound: f64,
        estimate: f64,
        tol: &Tolerances,
    ) -> (NodeId, NodeId, NodeId) {
        gourd_assert_simple!(tol.is_integral(value));
        let value = value.round();
        let down = self.create_child(lower_bound, estimate);
        self.attach_bound(down, var, BoundType::Upper, value - 1.0);
        let eq = self.create_child(lower_bound, estimate);
        self.attach_bound(eq, var, BoundType::Lower, value);
        self.attach_bound(eq, var, BoundType::Upper, value);
        let up = self.create_child(lower_bound, estimate);
        self.attach_bound(up, var, BoundType::Lower, value + 1.0);
        (down, eq, up)
    }

    /// N-ary branching: the domain `[lb, ub]` is partitioned into up to `n` intervals around
    /// `value`, their widths growing geometrically away from the centre.
    pub fn branch_nary(
        &mut self,
        var: VarId,
        value: f64,
        lb: f64,
        ub: f64,
        n: usize,
        widthfactor: f64,
        minwidth: f64,
        lower_bound: f64,
        estimate: f64,
        tol: &Tolerances,
    ) -> Vec<NodeId> {
        let intervals = nary_intervals(value, lb, ub, n, widthfactor, minwidth, tol);
        let mut children = Vec::with_capacity(intervals.len());
        for (int_lb, int_ub) in intervals {
            let child = self.create_child(lower_bound, estimate);
            if tol.is_gt(int_lb, lb) {
                self.attach_bound(child, var, BoundType::Lower, int_lb);
            }
            if tol.is_lt(int_ub, ub) {
                self.attach_bound(child, var, BoundType::Upper, int_ub);
            }
            children.push(child);
        }
        children
    }

    /// Switches the focus to an open node.
    ///
    /// Returns the depth of the deepest common ancestor with the previous focus node and the
    /// nodes on the path below it, in root-to-leaf order; the caller backtracks the domain
    /// state to that depth and replays the bound changes of the returned nodes.
    pub fn switch_focus(&mut self, target: NodeId) -> (usize, Vec<NodeId>) {
        if let Some(pos) = self.open.iter().position(|&open| open == target) {
            let _ = self.open.swap_remove(pos);
        }
        let old_path = self.path_from_root(self.focus);
        let new_path = self.path_from_root(target);
        let common = old_path
            .iter()
            .zip(&new_path)
            .take_while(|(a, b)| a == b)
            .count();
        gourd_assert_simple!(common > 0);
        self.focus = target;
        self.n_processed += 1;
        (common - 1, new_path[common..].to_vec())
    }

    fn path_from_root(&self, mut node: NodeId) -> Vec<NodeId> {
        let mut path = vec![node];
        while let Some(parent) = self.nodes[node].parent {
            path.push(parent);
            node = parent;
        }
        path.reverse();
        path
    }

    /// Marks a node cut off and drops it from the open list.
    pub fn cut_off(&mut self, node: NodeId) {
        self.nodes[node].cutoff = true;
        self.open.retain(|&open| open != node);
    }

    /// Removes open nodes whose lower bound meets the cutoff bound. Returns how many were
    /// pruned.
    pub fn prune_open(&mut self, tol: &Tolerances) -> usize {
        let cutoff_bound = self.cutoff_bound;
        let pruned: Vec<NodeId> = self
            .open
            .iter()
            .copied()
            .filter(|&id| tol.is_ge(self.nodes[id].lower_bound, cutoff_bound))
            .collect();
        for &id in &pruned {
            self.nodes[id].cutoff = true;
        }
        self.open
            .retain(|&id| !tol.is_ge(self.nodes[id].lower_bound, cutoff_bound));
        pruned.len()
    }

    /// The global dual bound: the weakest lower bound among the focus node and all open nodes.
    pub fn lower_bound(&self) -> f64 {
        let mut bound = if self.nodes[self.focus].cutoff {
            f64::INFINITY
        } else {
            self.nodes[self.focus].lower_bound
        };
        for &id in &self.open {
            bound = bound.min(self.nodes[id].lower_bound);
        }
        bound
    }

    pub fn update_lower_bound(&mut self, node: NodeId, lower_bound: f64) {
        let entry = &mut self.nodes[node];
        entry.lower_bound = entry.lower_bound.max(lower_bound);
    }

    /// Flags the subtree roots in the open list whose ancestor chain contains `node` for
    /// repropagation.
    pub fn mark_reprop(&mut self, node: NodeId) {
        let descendants: Vec<NodeId> = self
            .open
            .iter()
            .copied()
            .filter(|&open| self.is_ancestor(node, open))
            .collect();
        for id in descendants {
            self.nodes[id].reprop = true;
        }
        self.nodes[node].reprop = true;
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node].parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

/// Computes the n-ary branching intervals around `value` within `[lb, ub]`.
fn nary_intervals(
    value: f64,
    lb: f64,
    ub: f64,
    n: usize,
    widthfactor: f64,
    minwidth: f64,
    tol: &Tolerances,
) -> Vec<(f64, f64)> {
    gourd_assert_simple!(n >= 2 && widthfactor >= 1.0);
    let minwidth = minwidth.max(tol.feastol);
    let half = minwidth / 2.0;
    let centre = (
        (value - half).max(lb).min(ub),
        (value + half).min(ub).max(lb),
    );
    let mut intervals = vec![centre];
    let mut left = centre.0;
    let mut right = centre.1;
    let mut width = minwidth * widthfactor;
    while intervals.len() < n && (tol.is_gt(left, lb) || tol.is_lt(right, ub)) {
        if tol.is_gt(left, lb) {
            let new_left = (left - width).max(lb);
            intervals.insert(0, (new_left, left));
            left = new_left;
            if intervals.len() == n {
                break;
            }
        }
        if tol.is_lt(right, ub) {
            let new_right = (right + width).min(ub);
            intervals.push((right, new_right));
            right = new_right;
        }
        width *= widthfactor;
    }
    // The outermost intervals absorb whatever is left of the domain.
    if let Some(first) = intervals.first_mut() {
        first.0 = lb;
    }
    if let Some(last) = intervals.last_mut() {
        last.1 = ub;
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::StorageKey;

    fn var() -> VarId {
        VarId::create_from_index(0)
    }

    #[test]
    fn fractional_branching_creates_disjoint_children() {
        let mut tree = Tree::default();
        let tol = Tolerances::default();

        let (down, up) = tree.branch_frac(var(), 2.4, true, -f64::INFINITY, 0.0, &tol);
        assert_eq!(2, tree.n_open());

        let down_chg = &tree.node(down).domchg[0];
        assert_eq!(BoundType::Upper, down_chg.bound);
        assert_eq!(2.0, down_chg.value);
        let up_chg = &tree.node(up).domchg[0];
        assert_eq!(BoundType::Lower, up_chg.bound);
        assert_eq!(3.0, up_chg.value);
    }

    #[test]
    fn value_branching_creates_three_children() {
        let mut tree = Tree::default();
        let tol = Tolerances::default();

        let (down, eq, up) = tree.branch_val(var(), 4.0, -f64::INFINITY, 0.0, &tol);
        assert_eq!(3.0, tree.node(down).domchg[0].value);
        assert_eq!(2, tree.node(eq).domchg.len());
        assert_eq!(5.0, tree.node(up).domchg[0].value);
    }

    #[test]
    fn switching_focus_reports_the_common_ancestor() {
        let mut tree = Tree::default();
        let tol = Tolerances::default();

        let (down, up) = tree.branch_frac(var(), 1.5, true, -f64::INFINITY, 0.0, &tol);
        let (depth, path) = tree.switch_focus(down);
        assert_eq!(0, depth);
        assert_eq!(vec![down], path);

        // Branch deeper, then jump to the sibling of the first branching.
        let (deep_down, _) = tree.branch_frac(var(), 0.5, true, -f64::INFINITY, 0.0, &tol);
        let _ = tree.switch_focus(deep_down);
        let (depth, path) = tree.switch_focus(up);
        assert_eq!(0, depth);
        assert_eq!(vec![up], path);
        assert!(tree.open().iter().all(|&id| id != up));
    }

    #[test]
    fn pruning_respects_the_cutoff_bound() {
        let mut tree = Tree::default();
        let tol = Tolerances::default();

        let a = tree.create_child(5.0, 5.0);
        let _b = tree.create_child(2.0, 2.0);
        tree.cutoff_bound = 4.0;

        assert_eq!(1, tree.prune_open(&tol));
        assert!(tree.node(a).cutoff);
        assert_eq!(1, tree.n_open());
        assert_eq!(2.0, tree.open().iter().map(|&id| tree.node(id).lower_bound).fold(f64::INFINITY, f64::min));
    }

    #[test]
    fn lower_bound_spans_focus_and_open_nodes() {
        let mut tree = Tree::default();
        tree.update_lower_bound(tree.root(), 3.0);
        let _ = tree.create_child(5.0, 5.0);
        assert_eq!(3.0, tree.lower_bound());

        // Lower bounds only tighten.
        tree.update_lower_bound(tree.root(), 1.0);
        assert_eq!(3.0, tree.node(tree.root()).lower_bound);
    }

    #[test]
    fn nary_intervals_cover_the_domain() {
        let tol = Tolerances::default();
        let intervals = nary_intervals(5.0, 0.0, 10.0, 4, 2.0, 1.0, &tol);
        assert!(intervals.len() <= 4);
        assert_eq!(0.0, intervals.first().unwrap().0);
        assert_eq!(10.0, intervals.last().unwrap().1);
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0 + 1e-9);
        }
    }

    #[test]
    fn reprop_marks_open_descendants() {
        let mut tree = Tree::default();
        let tol = Tolerances::default();
        let (down, _up) = tree.branch_frac(var(), 1.5, true, -f64::INFINITY, 0.0, &tol);
        let _ = tree.switch_focus(down);
        let (deep, _) = tree.branch_frac(var(), 0.5, true, -f64::INFINITY, 0.0, &tol);

        tree.mark_reprop(down);
        assert!(tree.node(down).reprop);
        assert!(tree.node(deep).reprop);
    }
}
