//! A fractional diving heuristic.
//!
//! Repeatedly fixes the most fractional column of the LP solution to its nearest integer
//! inside a dive and resolves, hoping to tunnel to an integral point without creating tree
//! nodes. The dive is abandoned on the first infeasible or unbounded LP.

use log::trace;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use crate::containers::StorageKey;
use crate::lp::ColId;
use crate::lp::LpStatus;
use crate::plugins::HeurResult;
use crate::plugins::HeurTiming;
use crate::plugins::Heuristic;
use crate::plugins::Named;
use crate::plugins::PluginCtx;
use crate::primal::SolOrigin;
use crate::primal::Solution;
use crate::results::GourdResult;

use enumset::EnumSet;

pub const NAME: &str = "fracdiving";

/// How many fixing rounds one dive may take.
const MAX_DIVE_ROUNDS: usize = 10;

#[derive(Debug)]
pub struct FracDiving {
    pub n_calls: u64,
    rng: SmallRng,
}

impl Default for FracDiving {
    fn default() -> Self {
        FracDiving {
            n_calls: 0,
            rng: SmallRng::seed_from_u64(0x67757264),
        }
    }
}

impl Named for FracDiving {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "dives by fixing the most fractional column to its nearest integer"
    }

    fn priority(&self) -> i32 {
        -1003000
    }
}

impl FracDiving {
    /// The integral column whose value is farthest from an integer, random among ties.
    fn most_fractional(&mut self, ctx: &PluginCtx<'_>) -> Option<(ColId, f64)> {
        let mut best: Option<(ColId, f64, f64)> = None;
        for index in 0..ctx.lp.n_cols() {
            let col = ColId::create_from_index(index);
            if !ctx.lp.col(col).integral {
                continue;
            }
            let value = ctx.lp.col_primal(col);
            if ctx.tol.is_integral(value) {
                continue;
            }
            let distance = (ctx.tol.frac(value) - 0.5).abs();
            let better = match best {
                None => true,
                Some((_, _, incumbent)) => {
                    distance < incumbent || (distance == incumbent && self.rng.gen_bool(0.5))
                }
            };
            if better {
                best = Some((col, value, distance));
            }
        }
        best.map(|(col, value, _)| (col, value))
    }
}

impl Heuristic for FracDiving {
    fn timing(&self) -> EnumSet<HeurTiming> {
        HeurTiming::AfterLpNode.into()
    }

    fn freq(&self) -> i32 {
        10
    }

    fn exec(&mut self, ctx: &mut PluginCtx<'_>) -> GourdResult<(HeurResult, Vec<Solution>)> {
        if !ctx.lp.has_solution() || ctx.lp.in_dive() || ctx.lp.in_strongbranch() {
            return Ok((HeurResult::DidNotRun, Vec::new()));
        }
        if self.most_fractional(ctx).is_none() {
            return Ok((HeurResult::DidNotRun, Vec::new()));
        }
        self.n_calls += 1;

        ctx.lp.start_dive()?;
        let mut found = None;
        for _ in 0..MAX_DIVE_ROUNDS {
            let Some((col, value)) = self.most_fractional(ctx) else {
                // All integral columns settled; lift the point into a solution.
                let mut sol = Solution::new(SolOrigin::Heur(NAME.to_owned()), true);
                sol.depth = ctx.depth;
                for var in ctx.trans.active_var_ids() {
                    sol.set_val(var, ctx.relax_val(var));
                }
                sol.recompute_obj(ctx.trans);
                found = Some(sol);
                break;
            };
            let target = if ctx.tol.frac(value) > 0.5 {
                ctx.tol.feas_ceil(value)
            } else {
                ctx.tol.feas_floor(value)
            };
            trace!("diving: fixing column {col:?} at {value} to {target}");
            ctx.lp.chg_col_bounds_dive(col, target, target)?;
            let offset = ctx.trans.obj_offset;
            match ctx.lp.solve(ctx.tol, offset, None) {
                Ok(LpStatus::Optimal) => {}
                Ok(_) | Err(_) => break,
            }
        }
        ctx.lp.end_dive()?;
        match found {
            Some(sol) => Ok((HeurResult::FoundSol, vec![sol])),
            None => Ok((HeurResult::DidNotFind, Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::Col;
    use crate::lp::Lp;
    use crate::model::DomainState;
    use crate::model::Problem;
    use crate::model::VarStatus;
    use crate::model::VarType;
    use crate::model::Variable;
    use crate::num::Tolerances;
    use crate::primal::Primal;

    #[test]
    fn does_not_run_without_an_lp_solution() {
        let tol = Tolerances::default();
        let mut trans = Problem::new("t", true);
        let mut domain = DomainState::default();
        let mut lp = Lp::default();
        let primal = Primal::default();
        let mut ctx = PluginCtx {
            tol: &tol,
            trans: &mut trans,
            domain: &mut domain,
            lp: &mut lp,
            primal: &primal,
            depth: 0,
        };
        let mut heur = FracDiving::default();
        let (result, sols) = heur.exec(&mut ctx).unwrap();
        assert_eq!(HeurResult::DidNotRun, result);
        assert!(sols.is_empty());
    }

    #[test]
    fn dives_to_an_integral_point() {
        let tol = Tolerances::default();
        let mut trans = Problem::new("t", true);
        let mut var = Variable::new("x", 2.4, 10.0, 1.0, VarType::Integer);
        var.status = VarStatus::Column;
        let x = trans.add_var(var);

        let mut lp = Lp::default();
        let _ = lp.add_col(Col {
            var: x,
            obj: 1.0,
            lb: 2.4,
            ub: 10.0,
            integral: true,
        });
        lp.mark_constructed();
        let _ = lp.solve(&tol, 0.0, None).unwrap();

        let mut domain = DomainState::default();
        let primal = Primal::default();
        let mut ctx = PluginCtx {
            tol: &tol,
            trans: &mut trans,
            domain: &mut domain,
            lp: &mut lp,
            primal: &primal,
            depth: 0,
        };
        let mut heur = FracDiving::default();
        let (result, sols) = heur.exec(&mut ctx).unwrap();
        assert_eq!(HeurResult::FoundSol, result);
        assert_eq!(2.0, sols[0].raw_val(x));
        // The dive is fully unwound.
        assert!(!ctx.lp.in_dive());
    }
}
