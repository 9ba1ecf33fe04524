//! The constraint handler interface.

use super::ctx::PluginCtx;
use super::registry::Named;
use crate::conflict::ConflictBound;
use crate::containers::KeyedVec;
use crate::model::BoundEvent;
use crate::model::Cons;
use crate::model::ConsData;
use crate::model::ConsId;
use crate::model::Problem;
use crate::model::VarId;
use crate::model::Variable;
use crate::num::Tolerances;
use crate::primal::Solution;
use crate::results::GourdResult;
use crate::sepa::SepaStorage;

/// Outcome of a feasibility check against one candidate solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckResult {
    Feasible,
    Infeasible,
}

/// Outcome of constraint enforcement at the focus node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnforceResult {
    /// All constraints of the handler hold for the enforced solution.
    Feasible,
    /// The node is infeasible and must be cut off.
    Cutoff,
    /// The handler tightened local bounds; propagation should rerun.
    ReducedDom,
    /// The handler added cuts or constraints separating the solution.
    Separated,
    /// The handler created branching children.
    Branched,
    /// The solution violates a constraint and the handler created no remedy; the driver
    /// must resolve the infeasibility, usually by branching.
    Infeasible,
}

/// A constraint handler: owns the semantics of one constraint class.
///
/// `check`, `enforce_lp`, `enforce_pseudo`, and `lock` are the mandatory callbacks; the rest
/// default to doing nothing. Handlers are dispatched in the order of three priorities:
/// separation, enforcement, and checking (negative check priorities mean the handler only
/// needs to see solutions that everything else accepted).
pub trait ConsHdlr: Named {
    fn enforce_priority(&self) -> i32 {
        0
    }

    fn check_priority(&self) -> i32 {
        0
    }

    fn sepa_priority(&self) -> i32 {
        0
    }

    /// Separation frequency: every how many depth levels `separate` runs (-1 disables, 0
    /// means root only).
    fn sepa_freq(&self) -> i32 {
        -1
    }

    /// Propagation frequency, same encoding as `sepa_freq`.
    fn prop_freq(&self) -> i32 {
        -1
    }

    /// Creates the transformed payload of a constraint. Defaults to a plain copy.
    fn trans(&self, data: &dyn ConsData) -> Box<dyn ConsData> {
        data.duplicate()
    }

    /// Checks one constraint against a candidate solution.
    fn check(
        &self,
        problem: &Problem,
        tol: &Tolerances,
        cons: &Cons,
        sol: &Solution,
    ) -> CheckResult;

    /// Enforces the LP solution at the focus node.
    fn enforce_lp(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
        storage: &mut SepaStorage,
    ) -> GourdResult<EnforceResult>;

    /// Enforces the pseudo solution (no usable LP at the focus node).
    fn enforce_pseudo(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
    ) -> GourdResult<EnforceResult>;

    /// Registers the rounding locks the constraint imposes on its variables.
    ///
    /// `nlockspos`/`nlocksneg` follow the usual convention: they are added for the constraint
    /// itself and its negation, and a removal pass calls this with negated counts.
    fn lock(
        &self,
        data: &dyn ConsData,
        vars: &mut KeyedVec<VarId, Variable>,
        nlockspos: i32,
        nlocksneg: i32,
    );

    /// Adds the initial LP relaxation of the given constraints.
    fn init_lp(&mut self, ctx: &mut PluginCtx<'_>, conss: &[ConsId]) -> GourdResult<()> {
        let _ = (ctx, conss);
        Ok(())
    }

    /// Separates the current LP solution.
    fn separate(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
        storage: &mut SepaStorage,
    ) -> GourdResult<super::SepaResult> {
        let _ = (ctx, conss, storage);
        Ok(super::SepaResult::DidNotRun)
    }

    /// Propagates local domains.
    fn propagate(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
    ) -> GourdResult<super::PropResult> {
        let _ = (ctx, conss);
        Ok(super::PropResult::DidNotRun)
    }

    /// Presolves the given constraints on the global problem.
    fn presolve(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conss: &[ConsId],
    ) -> GourdResult<super::PresolResult> {
        let _ = (ctx, conss);
        Ok(super::PresolResult::DidNotRun)
    }

    /// Bounds witnessing that the constraint is infeasible in the current local domains,
    /// used to seed a conflict analysis. `None` when the handler cannot name a witness.
    fn infeasibility_bounds(
        &self,
        problem: &Problem,
        tol: &Tolerances,
        cons: &Cons,
    ) -> Option<Vec<ConflictBound>> {
        let _ = (problem, tol, cons);
        None
    }

    /// Reconstructs the premises of a bound change this handler inferred during propagation.
    ///
    /// `Ok(None)` aborts the conflict analysis that asked.
    fn resolve_propagation(
        &self,
        problem: &Problem,
        cons: &Cons,
        event: &BoundEvent,
    ) -> GourdResult<Option<Vec<ConflictBound>>> {
        let _ = (problem, cons, event);
        Ok(None)
    }
}
