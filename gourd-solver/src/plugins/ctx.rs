//! The view of the solver handed to plugin callbacks.

use crate::lp::Lp;
use crate::model::BoundReason;
use crate::model::DomainState;
use crate::model::Problem;
use crate::model::TightenOutcome;
use crate::model::VarId;
use crate::num::Tolerances;
use crate::primal::Primal;

/// Mutable access to the pieces of solver state a plugin may legally touch during a callback.
///
/// The driver assembles this view per dispatch; a plugin never holds onto it.
pub struct PluginCtx<'a> {
    pub tol: &'a Tolerances,
    /// The transformed problem.
    pub trans: &'a mut Problem,
    pub domain: &'a mut DomainState,
    pub lp: &'a mut Lp,
    pub primal: &'a Primal,
    /// Depth of the focus node.
    pub depth: usize,
}

impl PluginCtx<'_> {
    /// Value of the variable in the current relaxation solution, falling back to the local
    /// lower bound when the variable has no column or the LP is unsolved.
    pub fn relax_val(&self, var: VarId) -> f64 {
        if self.lp.has_solution() {
            if let Some(col) = self.lp.col_of(var) {
                return self.lp.col_primal(col);
            }
        }
        let v = &self.trans.vars[var];
        if v.lb_local.is_finite() {
            v.lb_local
        } else if v.ub_local.is_finite() {
            v.ub_local
        } else {
            0.0
        }
    }

    /// The pseudo objective: every variable at its objective-best local bound.
    pub fn pseudo_val(&self, var: VarId) -> f64 {
        let v = &self.trans.vars[var];
        if v.obj >= 0.0 && v.lb_local.is_finite() {
            v.lb_local
        } else if v.obj < 0.0 && v.ub_local.is_finite() {
            v.ub_local
        } else if v.lb_local.is_finite() {
            v.lb_local
        } else if v.ub_local.is_finite() {
            v.ub_local
        } else {
            0.0
        }
    }

    /// Tightens the local lower bound as an inference of the given origin.
    pub fn tighten_lb(&mut self, var: VarId, value: f64, reason: BoundReason) -> TightenOutcome {
        self.domain
            .tighten_lb_local(&mut self.trans.vars, self.tol, var, value, reason)
    }

    pub fn tighten_ub(&mut self, var: VarId, value: f64, reason: BoundReason) -> TightenOutcome {
        self.domain
            .tighten_ub_local(&mut self.trans.vars, self.tol, var, value, reason)
    }
}
