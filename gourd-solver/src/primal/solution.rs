//! Primal solution representation.

use fnv::FnvHashMap;
use fnv::FnvHashSet;

use crate::model::Problem;
use crate::model::VarId;
use crate::num::Tolerances;
use crate::results::Error;
use crate::results::GourdResult;

/// Where a solution came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolOrigin {
    /// Copied from the LP solution of the focus node.
    Lp,
    /// The pseudo solution (all variables at their best bounds).
    Pseudo,
    /// Produced by a relaxator.
    Relax,
    /// Produced by the named heuristic.
    Heur(String),
    /// Supplied by the user or read from a file.
    User,
}

/// A primal solution: sparse values over the variables of one problem space.
///
/// Values default to zero; variables can instead be marked unknown, which makes objective
/// evaluation and feasibility checks fail until a value is supplied.
#[derive(Clone, Debug)]
pub struct Solution {
    pub origin: SolOrigin,
    /// Whether the values refer to the transformed problem space.
    pub transformed: bool,
    vals: FnvHashMap<VarId, f64>,
    unknown: FnvHashSet<VarId>,
    /// Cached objective value in the space of the solution.
    pub obj: f64,
    /// Depth of the node the solution was found at.
    pub depth: usize,
}

impl Solution {
    pub fn new(origin: SolOrigin, transformed: bool) -> Solution {
        Solution {
            origin,
            transformed,
            vals: FnvHashMap::default(),
            unknown: FnvHashSet::default(),
            obj: 0.0,
            depth: 0,
        }
    }

    pub fn set_val(&mut self, var: VarId, value: f64) {
        let _ = self.unknown.remove(&var);
        let _ = self.vals.insert(var, value);
    }

    pub fn inc_val(&mut self, var: VarId, delta: f64) {
        let _ = self.unknown.remove(&var);
        *self.vals.entry(var).or_insert(0.0) += delta;
    }

    pub fn mark_unknown(&mut self, var: VarId) {
        let _ = self.vals.remove(&var);
        let _ = self.unknown.insert(var);
    }

    pub fn is_unknown(&self, var: VarId) -> bool {
        self.unknown.contains(&var)
    }

    pub fn has_unknowns(&self) -> bool {
        !self.unknown.is_empty()
    }

    /// Raw stored value of an active variable (zero if unset).
    pub fn raw_val(&self, var: VarId) -> f64 {
        self.vals.get(&var).copied().unwrap_or(0.0)
    }

    /// Value of a (possibly aggregated) variable, resolved through the aggregation graph of
    /// the problem the solution lives in.
    pub fn val(&self, problem: &Problem, var: VarId) -> f64 {
        problem.resolve_value(var, &|active| self.raw_val(active))
    }

    /// Recomputes and caches the objective value.
    pub fn recompute_obj(&mut self, problem: &Problem) -> f64 {
        self.obj = problem.obj_value(&|active| self.raw_val(active));
        self.obj
    }

    /// Rounds every discrete variable to a nearby integer; fails when a value is too far
    /// from integrality for rounding to be honest.
    pub fn round(&mut self, problem: &Problem, tol: &Tolerances) -> GourdResult<()> {
        for var in problem.vars.keys() {
            if !problem.vars[var].var_type.is_discrete() {
                continue;
            }
            if let Some(value) = self.vals.get(&var).copied() {
                let rounded = value.round();
                if (rounded - value).abs() > tol.feastol {
                    return Err(Error::InvalidData(format!(
                        "value {value} of {} is not near-integral",
                        problem.vars[var].name
                    )));
                }
                let _ = self.vals.insert(var, rounded);
            }
        }
        self.recompute_obj(problem);
        Ok(())
    }

    /// Translates a transformed-space solution into the original space.
    ///
    /// Every original variable is resolved through its transformed twin, walking fixings and
    /// aggregations; the result carries no unknown markers.
    pub fn retransform(&self, orig: &Problem, trans: &Problem) -> Solution {
        let mut sol = Solution::new(self.origin.clone(), false);
        sol.depth = self.depth;
        for var in orig.vars.keys() {
            let value = match orig.vars[var].transformed_twin {
                Some(twin) => trans.resolve_value(twin, &|active| self.raw_val(active)),
                None => self.val(orig, var),
            };
            sol.set_val(var, value);
        }
        sol.recompute_obj(orig);
        sol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarStatus;
    use crate::model::VarType;
    use crate::model::Variable;

    fn loose(name: &str, obj: f64, var_type: VarType) -> Variable {
        let mut var = Variable::new(name, 0.0, 10.0, obj, var_type);
        var.status = VarStatus::Loose;
        var
    }

    #[test]
    fn values_resolve_through_aggregations() {
        let mut prob = Problem::new("p", true);
        let x = prob.add_var(loose("x", 1.0, VarType::Continuous));
        let y = prob.add_var(loose("y", 0.0, VarType::Continuous));
        prob.aggregate_var(y, x, 2.0, 1.0).unwrap();

        let mut sol = Solution::new(SolOrigin::User, true);
        sol.set_val(x, 3.0);
        assert_eq!(3.0, sol.val(&prob, x));
        assert_eq!(7.0, sol.val(&prob, y));
    }

    #[test]
    fn rounding_rejects_fractional_discrete_values() {
        let mut prob = Problem::new("p", true);
        let x = prob.add_var(loose("x", 1.0, VarType::Integer));
        let tol = Tolerances::default();

        let mut sol = Solution::new(SolOrigin::User, true);
        sol.set_val(x, 2.0000001);
        sol.round(&prob, &tol).unwrap();
        assert_eq!(2.0, sol.raw_val(x));

        sol.set_val(x, 2.4);
        assert!(sol.round(&prob, &tol).is_err());
    }

    #[test]
    fn unknown_markers_are_cleared_by_assignment() {
        let mut prob = Problem::new("p", true);
        let x = prob.add_var(loose("x", 1.0, VarType::Continuous));

        let mut sol = Solution::new(SolOrigin::User, true);
        sol.mark_unknown(x);
        assert!(sol.has_unknowns());
        sol.set_val(x, 1.0);
        assert!(!sol.has_unknowns());
        let _ = prob;
    }

    #[test]
    fn retransformation_undoes_fixings_and_aggregations() {
        let mut orig = Problem::new("p", false);
        let ox = orig.add_var(loose("x", 1.0, VarType::Continuous));
        let oy = orig.add_var(loose("y", 2.0, VarType::Continuous));

        let mut trans = Problem::new("t_p", true);
        let tx = trans.add_var(loose("t_x", 1.0, VarType::Continuous));
        let ty = trans.add_var(loose("t_y", 2.0, VarType::Continuous));
        orig.vars[ox].transformed_twin = Some(tx);
        orig.vars[oy].transformed_twin = Some(ty);
        // Presolving fixed t_y to 4.
        trans.fix_var(ty, 4.0);

        let mut sol = Solution::new(SolOrigin::Lp, true);
        sol.set_val(tx, 1.5);

        let orig_sol = sol.retransform(&orig, &trans);
        assert!(!orig_sol.transformed);
        assert_eq!(1.5, orig_sol.raw_val(ox));
        assert_eq!(4.0, orig_sol.raw_val(oy));
        assert_eq!(1.5 + 8.0, orig_sol.obj);
    }
}
