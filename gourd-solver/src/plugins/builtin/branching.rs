//! The most-fractional branching rule.
//!
//! Picks the candidate whose LP value is closest to the middle between its floor and
//! ceiling, weighted by the branching priority and factor of the variable. Not the
//! strongest rule in the literature, but a dependable default.

use crate::model::VarId;
use crate::plugins::BranchResult;
use crate::plugins::BranchRule;
use crate::plugins::Named;
use crate::plugins::PluginCtx;
use crate::results::GourdResult;

pub const NAME: &str = "mostfrac";

#[derive(Debug, Default)]
pub struct MostFracBranching {
    pub n_calls: u64,
}

impl Named for MostFracBranching {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "branches on the most fractional LP candidate"
    }
}

impl BranchRule for MostFracBranching {
    fn exec_lp(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        candidates: &[(VarId, f64, f64)],
    ) -> GourdResult<BranchResult> {
        self.n_calls += 1;
        let best = candidates.iter().max_by(|a, b| {
            let score = |&(var, _, frac): &(VarId, f64, f64)| {
                let distance = (frac - 0.5).abs();
                let v = &ctx.trans.vars[var];
                (v.branch_priority, (0.5 - distance) * v.branch_factor)
            };
            let (pa, sa) = score(a);
            let (pb, sb) = score(b);
            pa.cmp(&pb).then(sa.total_cmp(&sb))
        });
        Ok(match best {
            Some(&(var, value, _)) => BranchResult::Branched { var, value },
            None => BranchResult::DidNotRun,
        })
    }

    fn exec_pseudo(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        candidates: &[VarId],
    ) -> GourdResult<BranchResult> {
        self.n_calls += 1;
        // Without an LP value, branch on the midpoint of the widest unfixed domain.
        let best = candidates
            .iter()
            .copied()
            .filter(|&var| !ctx.trans.vars[var].is_locally_fixed(ctx.tol))
            .max_by(|&a, &b| {
                let width = |var: VarId| {
                    let v = &ctx.trans.vars[var];
                    (v.ub_local - v.lb_local).min(ctx.tol.infinity)
                };
                width(a).total_cmp(&width(b))
            });
        Ok(match best {
            Some(var) => {
                let v = &ctx.trans.vars[var];
                let value = if v.lb_local.is_finite() && v.ub_local.is_finite() {
                    (v.lb_local + v.ub_local) / 2.0
                } else if v.lb_local.is_finite() {
                    v.lb_local + 1.0
                } else if v.ub_local.is_finite() {
                    v.ub_local - 1.0
                } else {
                    0.0
                };
                BranchResult::Branched { var, value }
            }
            None => BranchResult::DidNotRun,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::Lp;
    use crate::model::DomainState;
    use crate::model::Problem;
    use crate::model::VarStatus;
    use crate::model::VarType;
    use crate::model::Variable;
    use crate::num::Tolerances;
    use crate::primal::Primal;

    #[test]
    fn the_candidate_nearest_one_half_wins() {
        let tol = Tolerances::default();
        let mut trans = Problem::new("t", true);
        let mut ids = Vec::new();
        for name in ["a", "b", "c"] {
            let mut var = Variable::new(name, 0.0, 10.0, 1.0, VarType::Integer);
            var.status = VarStatus::Column;
            ids.push(trans.add_var(var));
        }

        let mut lp = Lp::default();
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
        let candidates = vec![
            (ids[0], 3.1, 0.1),
            (ids[1], 5.45, 0.45),
            (ids[2], 7.8, 0.8),
        ];
        let mut rule = MostFracBranching::default();
        let result = rule.exec_lp(&mut ctx, &candidates).unwrap();
        assert_eq!(
            BranchResult::Branched {
                var: ids[1],
                value: 5.45
            },
            result
        );
    }

    #[test]
    fn branch_priority_outranks_fractionality() {
        let tol = Tolerances::default();
        let mut trans = Problem::new("t", true);
        let mut low = Variable::new("low", 0.0, 10.0, 1.0, VarType::Integer);
        low.status = VarStatus::Column;
        let low = trans.add_var(low);
        let mut high = Variable::new("high", 0.0, 10.0, 1.0, VarType::Integer);
        high.status = VarStatus::Column;
        high.branch_priority = 10;
        let high = trans.add_var(high);

        let mut lp = Lp::default();
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
        let candidates = vec![(low, 3.5, 0.5), (high, 7.9, 0.9)];
        let mut rule = MostFracBranching::default();
        let result = rule.exec_lp(&mut ctx, &candidates).unwrap();
        assert!(matches!(result, BranchResult::Branched { var, .. } if var == high));
    }
}
