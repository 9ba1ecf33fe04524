//! Copying a solver instance.
//!
//! The copy is a fresh solver with the builtin plugin suite, the source's parameter values
//! and tolerances, and a clone of the original problem. With `global` set to false the local
//! domains of the transformed twins are folded into the copied global bounds, so the copy
//! describes the subproblem of the current node.

use super::solver::Solver;
use crate::model::VarId;
use crate::model::VarStatus;
use crate::results::GourdResult;

impl Solver {
    /// Copies this solver into a fresh instance. Returns the copy and whether it is a valid
    /// rendition of the source: the flag drops to false when a constraint's handler is not
    /// registered in the copy or a variable's aggregation cannot be expressed there.
    pub fn copy(&self, suffix: &str, global: bool) -> GourdResult<(Solver, bool)> {
        let mut target = Solver::new()?;
        self.params.copy_values_to(&mut target.params);
        target.tol = self.tol;

        let Some(orig) = self.orig.as_ref() else {
            return Ok((target, true));
        };
        target.create_prob(&format!("{}{suffix}", orig.name))?;
        let mut valid = true;

        // Variables are copied in arena order so that ids carry over to the copy.
        for id in orig.vars.keys() {
            let source = &orig.vars[id];
            let (lb, ub) = if global {
                (source.lb_global, source.ub_global)
            } else {
                match self.local_bounds_of(source.transformed_twin) {
                    Some(bounds) => bounds,
                    None => {
                        // An aggregated twin has no bounds of its own.
                        if self.twin_is_aggregated(source.transformed_twin) {
                            valid = false;
                        }
                        (source.lb_global, source.ub_global)
                    }
                }
            };
            let copied = target.create_var(&source.name, lb, ub, source.obj, source.var_type)?;
            let dest = target.orig.as_mut().ok_or(crate::results::Error::NoProblem)?;
            let var = &mut dest.vars[copied];
            var.branch_priority = source.branch_priority;
            var.branch_factor = source.branch_factor;
            var.branch_direction = source.branch_direction;
        }

        {
            let dest = target.orig.as_mut().ok_or(crate::results::Error::NoProblem)?;
            dest.objsense = orig.objsense;
            dest.obj_offset = orig.obj_offset;
        }

        for id in orig.conss.keys() {
            let cons = &orig.conss[id];
            if cons.deleted {
                continue;
            }
            if target.conshdlrs.find(&cons.hdlr).is_none() {
                valid = false;
                continue;
            }
            let _ = target.add_cons(cons.clone())?;
        }

        Ok((target, valid))
    }

    /// The local bounds of an active transformed twin, `None` when there is no usable twin.
    fn local_bounds_of(&self, twin: Option<VarId>) -> Option<(f64, f64)> {
        let trans = self.trans.as_ref()?;
        let twin = twin?;
        let var = &trans.vars[twin];
        match var.status {
            VarStatus::Fixed(value) => Some((value, value)),
            ref status if status.is_active() => Some((var.lb_local, var.ub_local)),
            _ => None,
        }
    }

    fn twin_is_aggregated(&self, twin: Option<VarId>) -> bool {
        let (Some(trans), Some(twin)) = (self.trans.as_ref(), twin) else {
            return false;
        };
        matches!(
            trans.vars[twin].status,
            VarStatus::Aggregated { .. } | VarStatus::MultiAggregated { .. } | VarStatus::Negated { .. }
        )
    }
}
