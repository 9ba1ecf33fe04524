//! The relaxator interface (relaxations other than the LP).

use super::ctx::PluginCtx;
use super::registry::Named;
use crate::results::GourdResult;

/// Outcome of a relaxator execution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RelaxResult {
    DidNotRun,
    /// The relaxation produced a valid local lower bound.
    Lowerbound(f64),
    /// The relaxation proved the node infeasible.
    Cutoff,
    /// Domains were reduced; propagation should rerun.
    ReducedDom,
}

pub trait Relaxator: Named {
    fn freq(&self) -> i32 {
        1
    }

    /// Whether the relaxation includes the LP rows (affects how its bound is combined with
    /// the LP bound).
    fn includes_lp(&self) -> bool {
        false
    }

    fn exec(&mut self, ctx: &mut PluginCtx<'_>) -> GourdResult<RelaxResult>;
}
