//! Trivial presolving: catches crossed bounds and fixes zero-width domains.

use crate::model::VarStatus;
use crate::plugins::Named;
use crate::plugins::PluginCtx;
use crate::plugins::PresolResult;
use crate::plugins::Presolver;
use crate::results::GourdResult;

pub const NAME: &str = "trivial";

#[derive(Debug, Default)]
pub struct TrivialPresol {
    pub n_fixed: u64,
}

impl Named for TrivialPresol {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "round bounds, fix zero-width domains, detect crossed bounds"
    }

    fn priority(&self) -> i32 {
        1000000
    }
}

impl Presolver for TrivialPresol {
    fn exec(&mut self, ctx: &mut PluginCtx<'_>, _round: u32) -> GourdResult<PresolResult> {
        let mut result = PresolResult::DidNotFind;
        for var in ctx.trans.active_var_ids() {
            let v = &ctx.trans.vars[var];
            let (lb, ub) = (v.lb_global, v.ub_global);
            if ctx.tol.is_feas_lt(ub, lb) {
                return Ok(PresolResult::Cutoff);
            }
            if ctx.tol.is_eq(lb, ub) && !matches!(v.status, VarStatus::Fixed(_)) {
                ctx.trans.fix_var(var, lb);
                self.n_fixed += 1;
                result = PresolResult::Reduced;
            }
        }
        Ok(result)
    }
}
