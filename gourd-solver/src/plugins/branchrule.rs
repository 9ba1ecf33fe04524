//! The branching rule interface.

use super::ctx::PluginCtx;
use super::registry::Named;
use crate::model::VarId;
use crate::results::GourdResult;

/// Outcome of a branching rule call.
#[derive(Clone, Debug, PartialEq)]
pub enum BranchResult {
    DidNotRun,
    /// Branch on the given variable around the given value.
    Branched { var: VarId, value: f64 },
    /// The rule proved the node infeasible instead of branching.
    Cutoff,
    /// The rule tightened domains; propagation should rerun before branching.
    ReducedDom,
}

pub trait BranchRule: Named {
    /// Maximal depth the rule applies at (-1 for no limit).
    fn maxdepth(&self) -> i32 {
        -1
    }

    /// Chooses a branching from the fractional LP candidates `(var, lp value, fractionality)`.
    fn exec_lp(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        candidates: &[(VarId, f64, f64)],
    ) -> GourdResult<BranchResult>;

    /// Chooses a branching without an LP solution; candidates are unfixed discrete variables.
    fn exec_pseudo(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        candidates: &[VarId],
    ) -> GourdResult<BranchResult> {
        let _ = ctx;
        match candidates.first() {
            Some(&var) => Ok(BranchResult::Branched {
                var,
                value: f64::NAN,
            }),
            None => Ok(BranchResult::DidNotRun),
        }
    }
}
