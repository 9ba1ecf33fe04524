//! The linear constraint handler: `lhs <= a'x <= rhs`.

use log::debug;

use crate::conflict::ConflictBound;
use crate::containers::KeyedVec;
use crate::model::BoundEvent;
use crate::model::BoundReason;
use crate::model::BoundType;
use crate::model::Cons;
use crate::model::ConsData;
use crate::model::ConsId;
use crate::model::Problem;
use crate::model::TightenOutcome;
use crate::model::VarId;
use crate::model::Variable;
use crate::num::Tolerances;
use crate::plugins::CheckResult;
use crate::plugins::ConsHdlr;
use crate::plugins::EnforceResult;
use crate::plugins::Named;
use crate::plugins::PluginCtx;
use crate::plugins::PresolResult;
use crate::plugins::PropResult;
use crate::primal::Solution;
use crate::results::GourdResult;
use crate::sepa::SepaStorage;

pub const NAME: &str = "linear";

/// Payload of one linear constraint.
#[derive(Clone, Debug)]
pub struct LinearConsData {
    pub terms: Vec<(VarId, f64)>,
    pub lhs: f64,
    pub rhs: f64,
}

impl ConsData for LinearConsData {
    fn duplicate(&self) -> Box<dyn ConsData> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Default)]
pub struct LinearConsHdlr {
    pub n_propagations: u64,
    pub n_cutoffs: u64,
}

impl LinearConsHdlr {
    fn data<'a>(&self, cons: &'a Cons) -> &'a LinearConsData {
        cons.data
            .downcast_ref::<LinearConsData>()
            .expect("linear constraint with foreign payload")
    }

    /// (min, max) activity over the local bounds; infinities propagate.
    fn activity_bounds(data: &LinearConsData, vars: &KeyedVec<VarId, Variable>) -> (f64, f64) {
        let mut min = 0.0;
        let mut max = 0.0;
        for &(var, coef) in &data.terms {
            let (lb, ub) = (vars[var].lb_local, vars[var].ub_local);
            if coef > 0.0 {
                min += coef * lb;
                max += coef * ub;
            } else {
                min += coef * ub;
                max += coef * lb;
            }
        }
        (min, max)
    }

    fn build_row(
        &self,
        ctx: &PluginCtx<'_>,
        name: &str,
        data: &LinearConsData,
        local: bool,
    ) -> Option<crate::lp::Row> {
        let mut terms = Vec::with_capacity(data.terms.len());
        for &(var, coef) in &data.terms {
            terms.push((ctx.lp.col_of(var)?, coef));
        }
        Some(crate::lp::Row {
            name: name.to_owned(),
            lhs: data.lhs,
            rhs: data.rhs,
            terms,
            constant: 0.0,
            local,
            removable: false,
            modifiable: false,
            age: 0.0,
            rank: 0,
        })
    }
}

impl Named for LinearConsHdlr {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "linear constraints of the form lhs <= a'x <= rhs"
    }
}

impl ConsHdlr for LinearConsHdlr {
    fn enforce_priority(&self) -> i32 {
        -1000000
    }

    fn check_priority(&self) -> i32 {
        -1000000
    }

    fn sepa_freq(&self) -> i32 {
        1
    }

    fn prop_freq(&self) -> i32 {
        1
    }

    fn check(
        &self,
        problem: &Problem,
        tol: &Tolerances,
        cons: &Cons,
        sol: &Solution,
    ) -> CheckResult {
        let data = self.data(cons);
        let activity: f64 = data
            .terms
            .iter()
            .map(|&(var, coef)| coef * sol.val(problem, var))
            .sum();
        if tol.is_feas_ge(activity, data.lhs) && tol.is_feas_le(activity, data.rhs) {
            CheckResult::Feasible
        } else {
            CheckResult::Infeasible
        }
    }

    fn init_lp(&mut self, ctx: &mut PluginCtx<'_>, conss: &[ConsId]) -> GourdResult<()> {
        for &id in conss {
            let cons = &ctx.trans.conss[id];
            if !cons.flags.initial {
                continue;
            }
            let data = self.data(cons).clone();
            let local = cons.flags.local;
            let name = cons.name.clone();
            if let Some(row) = self.build_row(ctx, &name, &data, local) {
                let _ = ctx.lp.add_row(row);
            }
        }
        Ok(())
    }

    fn enforce_lp(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
        storage: &mut SepaStorage,
    ) -> GourdResult<EnforceResult> {
        let mut result = EnforceResult::Feasible;
        for &id in conss {
            let cons = &ctx.trans.conss[id];
            let data = self.data(cons).clone();
            let name = cons.name.clone();
            let local = cons.flags.local;
            let activity: f64 = data
                .terms
                .iter()
                .map(|&(var, coef)| coef * ctx.relax_val(var))
                .sum();
            if ctx.tol.is_feas_ge(activity, data.lhs) && ctx.tol.is_feas_le(activity, data.rhs) {
                continue;
            }
            // The row is missing from the relaxation (non-initial or aged out); force it in.
            match self.build_row(ctx, &name, &data, local) {
                Some(row) => {
                    let lp = &ctx.lp;
                    let admitted =
                        storage.add_cut(row, &|col| lp.col_primal(col), ctx.tol, true);
                    debug!("enforcing linear constraint {name} by separation");
                    if admitted {
                        result = EnforceResult::Separated;
                    }
                }
                None => return Ok(EnforceResult::Infeasible),
            }
        }
        Ok(result)
    }

    fn enforce_pseudo(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
    ) -> GourdResult<EnforceResult> {
        for &id in conss {
            let cons = &ctx.trans.conss[id];
            let data = self.data(cons);
            let (min, max) = Self::activity_bounds(data, &ctx.trans.vars);
            if ctx.tol.is_feas_gt(min, data.rhs) || ctx.tol.is_feas_lt(max, data.lhs) {
                return Ok(EnforceResult::Cutoff);
            }
            let activity: f64 = data
                .terms
                .iter()
                .map(|&(var, coef)| coef * ctx.pseudo_val(var))
                .sum();
            if !ctx.tol.is_feas_ge(activity, data.lhs) || !ctx.tol.is_feas_le(activity, data.rhs) {
                return Ok(EnforceResult::Infeasible);
            }
        }
        Ok(EnforceResult::Feasible)
    }

    fn propagate(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
    ) -> GourdResult<PropResult> {
        self.n_propagations += 1;
        let mut result = PropResult::DidNotFind;
        for &id in conss {
            let data = self.data(&ctx.trans.conss[id]).clone();
            let (min, max) = Self::activity_bounds(&data, &ctx.trans.vars);
            if ctx.tol.is_feas_gt(min, data.rhs) || ctx.tol.is_feas_lt(max, data.lhs) {
                self.n_cutoffs += 1;
                return Ok(PropResult::Cutoff);
            }
            for &(var, coef) in &data.terms {
                let (lb, ub) = (ctx.trans.vars[var].lb_local, ctx.trans.vars[var].ub_local);
                // Residual activities without this term; infinite residuals yield no bound.
                let (self_min, self_max) = if coef > 0.0 {
                    (coef * lb, coef * ub)
                } else {
                    (coef * ub, coef * lb)
                };
                let res_min = min - self_min;
                let res_max = max - self_max;
                let reason = BoundReason::ConsInference(id);
                let mut outcome = TightenOutcome::Unchanged;
                if res_min.is_finite() && !ctx.tol.is_infinity(data.rhs) {
                    let limit = (data.rhs - res_min) / coef;
                    outcome = if coef > 0.0 {
                        ctx.tighten_ub(var, limit, reason.clone())
                    } else {
                        ctx.tighten_lb(var, limit, reason.clone())
                    };
                }
                if outcome != TightenOutcome::Infeasible
                    && res_max.is_finite()
                    && !ctx.tol.is_neg_infinity(data.lhs)
                {
                    let limit = (data.lhs - res_max) / coef;
                    let second = if coef > 0.0 {
                        ctx.tighten_lb(var, limit, reason)
                    } else {
                        ctx.tighten_ub(var, limit, reason)
                    };
                    if second != TightenOutcome::Unchanged {
                        outcome = second;
                    }
                }
                match outcome {
                    TightenOutcome::Infeasible => {
                        self.n_cutoffs += 1;
                        return Ok(PropResult::Cutoff);
                    }
                    TightenOutcome::Tightened => result = PropResult::ReducedDom,
                    TightenOutcome::Unchanged => {}
                }
            }
        }
        Ok(result)
    }

    fn presolve(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
    ) -> GourdResult<PresolResult> {
        let mut result = PresolResult::DidNotFind;
        for &id in conss {
            if ctx.trans.conss[id].deleted {
                continue;
            }
            let data = self.data(&ctx.trans.conss[id]).clone();
            if data.terms.is_empty() {
                if ctx.tol.is_feas_gt(0.0, data.rhs) || ctx.tol.is_feas_lt(0.0, data.lhs) {
                    return Ok(PresolResult::Cutoff);
                }
                ctx.trans.del_cons(id);
                result = PresolResult::Reduced;
                continue;
            }
            if let [(var, coef)] = data.terms[..] {
                // Singleton row: fold the sides into global bounds and drop the constraint.
                let (mut lo, mut hi) = (data.lhs / coef, data.rhs / coef);
                if coef < 0.0 {
                    std::mem::swap(&mut lo, &mut hi);
                }
                let v = &mut ctx.trans.vars[var];
                let new_lb = v.lb_global.max(v.adjusted_lb(ctx.tol, lo));
                let new_ub = v.ub_global.min(v.adjusted_ub(ctx.tol, hi));
                if ctx.tol.is_feas_lt(new_ub, new_lb) {
                    return Ok(PresolResult::Cutoff);
                }
                if new_lb > v.lb_global || new_ub < v.ub_global {
                    v.lb_global = new_lb;
                    v.ub_global = new_ub;
                    v.lb_local = v.lb_local.max(new_lb);
                    v.ub_local = v.ub_local.min(new_ub);
                }
                ctx.trans.del_cons(id);
                result = PresolResult::Reduced;
            }
        }
        Ok(result)
    }

    fn lock(
        &self,
        data: &dyn ConsData,
        vars: &mut KeyedVec<VarId, Variable>,
        nlockspos: i32,
        nlocksneg: i32,
    ) {
        let data = data
            .downcast_ref::<LinearConsData>()
            .expect("linear constraint with foreign payload");
        let lhs_finite = data.lhs > -1e20;
        let rhs_finite = data.rhs < 1e20;
        for &(var, coef) in &data.terms {
            let mut down = 0;
            let mut up = 0;
            if lhs_finite {
                down += nlockspos;
                up += nlocksneg;
            }
            if rhs_finite {
                up += nlockspos;
                down += nlocksneg;
            }
            if coef > 0.0 {
                vars[var].add_locks(down, up);
            } else {
                vars[var].add_locks(up, down);
            }
        }
    }

    fn infeasibility_bounds(
        &self,
        problem: &Problem,
        tol: &Tolerances,
        cons: &Cons,
    ) -> Option<Vec<ConflictBound>> {
        let data = self.data(cons);
        let (min, max) = Self::activity_bounds(data, &problem.vars);
        // The witness is the set of bounds that built the violating activity bound.
        let used_min_activity = if tol.is_feas_gt(min, data.rhs) {
            true
        } else if tol.is_feas_lt(max, data.lhs) {
            false
        } else {
            return None;
        };
        let mut bounds = Vec::with_capacity(data.terms.len());
        for &(var, coef) in &data.terms {
            let towards_lower = (coef > 0.0) == used_min_activity;
            let (bound, value) = if towards_lower {
                (BoundType::Lower, problem.vars[var].lb_local)
            } else {
                (BoundType::Upper, problem.vars[var].ub_local)
            };
            if value.is_finite() {
                bounds.push(ConflictBound { var, bound, value });
            }
        }
        Some(bounds)
    }

    fn resolve_propagation(
        &self,
        problem: &Problem,
        cons: &Cons,
        event: &BoundEvent,
    ) -> GourdResult<Option<Vec<ConflictBound>>> {
        // The tightening followed from the opposite bounds of the other variables.
        let data = self.data(cons);
        let Some(&(_, coef)) = data.terms.iter().find(|&&(var, _)| var == event.var) else {
            return Ok(None);
        };
        // An upper-bound tightening with positive coefficient used the rhs and the minimum
        // residual activity; the premises are the bound events that built that residual.
        let used_min_activity = (event.bound == BoundType::Upper) == (coef > 0.0);
        let mut premises = Vec::new();
        for &(var, other_coef) in &data.terms {
            if var == event.var {
                continue;
            }
            let towards_lower = (other_coef > 0.0) == used_min_activity;
            let (bound, value) = if towards_lower {
                (BoundType::Lower, problem.vars[var].lb_local)
            } else {
                (BoundType::Upper, problem.vars[var].ub_local)
            };
            if value.is_finite() {
                premises.push(ConflictBound { var, bound, value });
            }
        }
        Ok(Some(premises))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConsFlags;
    use crate::model::DomainState;
    use crate::model::VarStatus;
    use crate::model::VarType;
    use crate::primal::SolOrigin;

    fn setup() -> (Problem, DomainState, Tolerances) {
        let mut trans = Problem::new("t", true);
        for name in ["x", "y"] {
            let mut var = Variable::new(name, 0.0, 10.0, 1.0, VarType::Integer);
            var.status = VarStatus::Loose;
            let _ = trans.add_var(var);
        }
        (trans, DomainState::default(), Tolerances::default())
    }

    fn linear_cons(trans: &mut Problem, terms: Vec<(VarId, f64)>, lhs: f64, rhs: f64) -> ConsId {
        let data = LinearConsData { terms, lhs, rhs };
        trans
            .add_cons(Cons::new(
                &format!("c{}", trans.n_conss()),
                NAME,
                ConsFlags::default(),
                Box::new(data),
            ))
            .unwrap()
    }

    #[test]
    fn check_accepts_and_rejects_by_activity() {
        let (mut trans, _, tol) = setup();
        let x = trans.find_var("x").unwrap();
        let y = trans.find_var("y").unwrap();
        let id = linear_cons(&mut trans, vec![(x, 1.0), (y, 1.0)], 3.0, f64::INFINITY);
        let hdlr = LinearConsHdlr::default();

        let mut sol = Solution::new(SolOrigin::User, true);
        sol.set_val(x, 1.0);
        sol.set_val(y, 2.0);
        assert_eq!(
            CheckResult::Feasible,
            hdlr.check(&trans, &tol, &trans.conss[id], &sol)
        );

        sol.set_val(y, 1.0);
        assert_eq!(
            CheckResult::Infeasible,
            hdlr.check(&trans, &tol, &trans.conss[id], &sol)
        );
    }

    #[test]
    fn propagation_tightens_residual_bounds() {
        let (mut trans, mut domain, tol) = setup();
        let x = trans.find_var("x").unwrap();
        let y = trans.find_var("y").unwrap();
        // x + y <= 4 with y >= 3 forces x <= 1.
        let id = linear_cons(&mut trans, vec![(x, 1.0), (y, 1.0)], -f64::INFINITY, 4.0);
        let _ = domain.tighten_lb_local(&mut trans.vars, &tol, y, 3.0, BoundReason::Branching);

        let mut lp = crate::lp::Lp::default();
        let primal = crate::primal::Primal::default();
        let mut ctx = PluginCtx {
            tol: &tol,
            trans: &mut trans,
            domain: &mut domain,
            lp: &mut lp,
            primal: &primal,
            depth: 0,
        };
        let mut hdlr = LinearConsHdlr::default();
        let result = hdlr.propagate(&mut ctx, &[id]).unwrap();
        assert_eq!(PropResult::ReducedDom, result);
        assert_eq!(1.0, trans.vars[x].ub_local);
    }

    #[test]
    fn propagation_detects_infeasible_activity() {
        let (mut trans, mut domain, tol) = setup();
        let x = trans.find_var("x").unwrap();
        let y = trans.find_var("y").unwrap();
        // x + y >= 25 cannot be met within [0,10]^2.
        let id = linear_cons(&mut trans, vec![(x, 1.0), (y, 1.0)], 25.0, f64::INFINITY);

        let mut lp = crate::lp::Lp::default();
        let primal = crate::primal::Primal::default();
        let mut ctx = PluginCtx {
            tol: &tol,
            trans: &mut trans,
            domain: &mut domain,
            lp: &mut lp,
            primal: &primal,
            depth: 0,
        };
        let mut hdlr = LinearConsHdlr::default();
        assert_eq!(PropResult::Cutoff, hdlr.propagate(&mut ctx, &[id]).unwrap());
    }

    #[test]
    fn presolve_folds_singleton_rows_into_bounds() {
        let (mut trans, mut domain, tol) = setup();
        let x = trans.find_var("x").unwrap();
        // 2x <= 7 tightens the global upper bound to 3 (integer rounding).
        let id = linear_cons(&mut trans, vec![(x, 2.0)], -f64::INFINITY, 7.0);

        let mut lp = crate::lp::Lp::default();
        let primal = crate::primal::Primal::default();
        let mut ctx = PluginCtx {
            tol: &tol,
            trans: &mut trans,
            domain: &mut domain,
            lp: &mut lp,
            primal: &primal,
            depth: 0,
        };
        let mut hdlr = LinearConsHdlr::default();
        assert_eq!(
            PresolResult::Reduced,
            hdlr.presolve(&mut ctx, &[id]).unwrap()
        );
        assert_eq!(3.0, trans.vars[x].ub_global);
        assert!(trans.conss[id].deleted);
    }

    #[test]
    fn locks_follow_coefficient_signs_and_sides() {
        let (mut trans, _, _) = setup();
        let x = trans.find_var("x").unwrap();
        let y = trans.find_var("y").unwrap();
        let data = LinearConsData {
            terms: vec![(x, 1.0), (y, -1.0)],
            lhs: 0.0,
            rhs: f64::INFINITY,
        };
        let hdlr = LinearConsHdlr::default();
        hdlr.lock(&data, &mut trans.vars, 1, 0);

        // x - y >= 0: rounding x down or y up can violate it.
        assert_eq!(1, trans.vars[x].nlocks_down);
        assert_eq!(0, trans.vars[x].nlocks_up);
        assert_eq!(0, trans.vars[y].nlocks_down);
        assert_eq!(1, trans.vars[y].nlocks_up);
    }
}
