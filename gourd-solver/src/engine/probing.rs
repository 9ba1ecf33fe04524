//! Temporary overlays on the search state: probing (a trail overlay with propagation),
//! diving (an LP overlay), and strong branching.
//!
//! The three modes are mutually exclusive. Probing owns the domain trail above the frame it
//! started at and restores it completely on exit; diving and strong branching only touch
//! the LP and never the trail.

use super::search::PropOutcome;
use super::stage::Stage;
use super::solver::Solver;
use crate::lp::LpStatus;
use crate::lp::StrongBranchResult;
use crate::model::BoundReason;
use crate::model::VarId;
use crate::results::Error;
use crate::results::GourdResult;

impl Solver {
    pub fn in_probing(&self) -> bool {
        self.probing_base.is_some()
    }

    /// Enters probing mode on a fresh trail frame.
    pub fn start_probing(&mut self) -> GourdResult<()> {
        self.stage.require(
            "start_probing",
            &[Stage::Transformed, Stage::Presolving, Stage::Solving],
        )?;
        if self.in_probing() || self.lp.in_dive() || self.lp.in_strongbranch() {
            return Err(Error::InvalidCall {
                operation: "start_probing",
                stage: self.stage.stage(),
            });
        }
        self.probing_base = Some(self.domain.current_frame());
        self.domain.push_frame();
        Ok(())
    }

    fn require_probing(&self, operation: &'static str) -> GourdResult<usize> {
        self.probing_base.ok_or(Error::InvalidCall {
            operation,
            stage: self.stage.stage(),
        })
    }

    /// Opens a deeper probing node.
    pub fn new_probing_node(&mut self) -> GourdResult<()> {
        let _ = self.require_probing("new_probing_node")?;
        self.domain.push_frame();
        Ok(())
    }

    /// Depth within the probing path; the node opened by `start_probing` has depth 0.
    pub fn probing_depth(&self) -> GourdResult<usize> {
        let base = self.require_probing("probing_depth")?;
        Ok(self.domain.current_frame() - base - 1)
    }

    /// Undoes all probing nodes deeper than `depth`.
    pub fn backtrack_probing(&mut self, depth: usize) -> GourdResult<()> {
        let base = self.require_probing("backtrack_probing")?;
        let target = base + 1 + depth;
        if target > self.domain.current_frame() {
            return Err(Error::InvalidData(format!(
                "probing depth {depth} is beyond the current probing path"
            )));
        }
        if target < self.domain.current_frame() {
            let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
            self.domain.backtrack_to(target, &mut trans.vars);
        }
        Ok(())
    }

    /// Leaves probing mode, restoring the trail and all local bounds.
    pub fn end_probing(&mut self) -> GourdResult<()> {
        let base = self.require_probing("end_probing")?;
        self.probing_base = None;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        if self.domain.current_frame() > base {
            self.domain.backtrack_to(base, &mut trans.vars);
        }
        Ok(())
    }

    pub fn chg_var_lb_probing(&mut self, var: VarId, lb: f64) -> GourdResult<()> {
        let _ = self.require_probing("chg_var_lb_probing")?;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        self.domain
            .chg_lb_local(&mut trans.vars, var, lb, BoundReason::Branching);
        Ok(())
    }

    pub fn chg_var_ub_probing(&mut self, var: VarId, ub: f64) -> GourdResult<()> {
        let _ = self.require_probing("chg_var_ub_probing")?;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        self.domain
            .chg_ub_local(&mut trans.vars, var, ub, BoundReason::Branching);
        Ok(())
    }

    pub fn fix_var_probing(&mut self, var: VarId, value: f64) -> GourdResult<()> {
        let _ = self.require_probing("fix_var_probing")?;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        self.domain
            .chg_lb_local(&mut trans.vars, var, value, BoundReason::Branching);
        self.domain
            .chg_ub_local(&mut trans.vars, var, value, BoundReason::Branching);
        Ok(())
    }

    /// Propagates the probing domains, ignoring depth frequencies. Returns whether a cutoff
    /// was detected and how many bound changes were produced.
    pub fn propagate_probing(&mut self, maxrounds: i32) -> GourdResult<(bool, u64)> {
        let _ = self.require_probing("propagate_probing")?;
        let before = self.domain.events().len();
        let depth = self.tree.node(self.tree.focus()).depth;
        let outcome = self.propagate_rounds(depth, maxrounds, true)?;
        let ndomreds = (self.domain.events().len() - before) as u64;
        Ok((outcome == PropOutcome::Cutoff, ndomreds))
    }

    // ------------------------------------------------------------------
    // Diving.
    // ------------------------------------------------------------------

    pub fn in_dive(&self) -> bool {
        self.lp.in_dive()
    }

    pub fn start_dive(&mut self) -> GourdResult<()> {
        self.stage.require("start_dive", &[Stage::Solving])?;
        if self.in_probing() {
            return Err(Error::InvalidCall {
                operation: "start_dive",
                stage: self.stage.stage(),
            });
        }
        self.lp.start_dive()
    }

    pub fn end_dive(&mut self) -> GourdResult<()> {
        self.stage.require("end_dive", &[Stage::Solving])?;
        self.lp.end_dive()
    }

    pub fn chg_var_obj_dive(&mut self, var: VarId, obj: f64) -> GourdResult<()> {
        self.stage.require("chg_var_obj_dive", &[Stage::Solving])?;
        let col = self
            .lp
            .col_of(var)
            .ok_or_else(|| Error::InvalidData("variable has no LP column".to_owned()))?;
        self.lp.chg_col_obj_dive(col, obj)
    }

    pub fn chg_var_bounds_dive(&mut self, var: VarId, lb: f64, ub: f64) -> GourdResult<()> {
        self.stage.require("chg_var_bounds_dive", &[Stage::Solving])?;
        let col = self
            .lp
            .col_of(var)
            .ok_or_else(|| Error::InvalidData("variable has no LP column".to_owned()))?;
        self.lp.chg_col_bounds_dive(col, lb, ub)
    }

    pub fn solve_dive_lp(&mut self, iter_limit: Option<u64>) -> GourdResult<LpStatus> {
        self.stage.require("solve_dive_lp", &[Stage::Solving])?;
        if !self.lp.in_dive() {
            return Err(Error::InvalidCall {
                operation: "solve_dive_lp",
                stage: self.stage.stage(),
            });
        }
        let offset = self.trans.as_ref().ok_or(Error::NoProblem)?.obj_offset;
        let tol = self.tol;
        self.lp.solve(&tol, offset, iter_limit)
    }

    // ------------------------------------------------------------------
    // Strong branching.
    // ------------------------------------------------------------------

    pub fn in_strongbranch(&self) -> bool {
        self.lp.in_strongbranch()
    }

    pub fn start_strongbranch(&mut self) -> GourdResult<()> {
        self.stage
            .require("start_strongbranch", &[Stage::Solving])?;
        if self.in_probing() {
            return Err(Error::InvalidCall {
                operation: "start_strongbranch",
                stage: self.stage.stage(),
            });
        }
        self.lp.start_strongbranch()
    }

    pub fn end_strongbranch(&mut self) -> GourdResult<()> {
        self.stage
            .require("end_strongbranch", &[Stage::Solving])?;
        self.lp.end_strongbranch()
    }

    /// Strong branching on a fractional value: evaluates both child LPs without keeping any
    /// of their state.
    pub fn get_var_strongbranch_frac(
        &mut self,
        var: VarId,
        value: f64,
        iter_limit: Option<u64>,
    ) -> GourdResult<StrongBranchResult> {
        self.stage
            .require("get_var_strongbranch_frac", &[Stage::Solving])?;
        let col = self
            .lp
            .col_of(var)
            .ok_or_else(|| Error::InvalidData("variable has no LP column".to_owned()))?;
        let offset = self.trans.as_ref().ok_or(Error::NoProblem)?.obj_offset;
        let tol = self.tol;
        self.lp.strongbranch(col, value, &tol, offset, iter_limit)
    }

    /// Strong branching on an integral value: the down branch caps the variable below the
    /// value, the up branch forces it to the value or above.
    pub fn get_var_strongbranch_int(
        &mut self,
        var: VarId,
        value: f64,
        iter_limit: Option<u64>,
    ) -> GourdResult<StrongBranchResult> {
        if !self.tol.is_integral(value) {
            return Err(Error::InvalidData(format!(
                "strong branching on non-integral value {value}"
            )));
        }
        let down = self.get_var_strongbranch_frac(var, value - 0.5, iter_limit)?;
        let up = self.get_var_strongbranch_frac(var, value + 0.5, iter_limit)?;
        Ok(StrongBranchResult {
            down_bound: down.down_bound,
            up_bound: up.up_bound,
            down_valid: down.down_valid,
            up_valid: up.up_valid,
            down_infeasible: down.down_infeasible,
            up_infeasible: up.up_infeasible,
            down_conflict: false,
            up_conflict: false,
            lperror: down.lperror || up.lperror,
        })
    }

    /// Strong branching with domain propagation: each branch is probed, propagated, and its
    /// LP solved, so propagation-detected infeasibility produces conflict constraints.
    pub fn get_var_strongbranch_with_propagation(
        &mut self,
        var: VarId,
        value: f64,
        iter_limit: Option<u64>,
    ) -> GourdResult<StrongBranchResult> {
        self.stage.require(
            "get_var_strongbranch_with_propagation",
            &[Stage::Solving],
        )?;
        if self.in_probing() || self.lp.in_dive() || self.lp.in_strongbranch() {
            return Err(Error::InvalidCall {
                operation: "get_var_strongbranch_with_propagation",
                stage: self.stage.stage(),
            });
        }
        let mut result = StrongBranchResult {
            down_bound: f64::NEG_INFINITY,
            up_bound: f64::NEG_INFINITY,
            down_valid: false,
            up_valid: false,
            down_infeasible: false,
            up_infeasible: false,
            down_conflict: false,
            up_conflict: false,
            lperror: false,
        };
        for downwards in [true, false] {
            self.start_probing()?;
            let probe = self.strongbranch_probe(var, value, downwards, iter_limit);
            self.end_probing()?;
            let (bound, valid, infeasible, conflict, lperror) = probe?;
            if downwards {
                result.down_bound = bound;
                result.down_valid = valid;
                result.down_infeasible = infeasible;
                result.down_conflict = conflict;
            } else {
                result.up_bound = bound;
                result.up_valid = valid;
                result.up_infeasible = infeasible;
                result.up_conflict = conflict;
            }
            result.lperror = result.lperror || lperror;
        }
        self.sync_lp_bounds()?;
        self.lp.n_strongbranches += 1;
        Ok(result)
    }

    fn strongbranch_probe(
        &mut self,
        var: VarId,
        value: f64,
        downwards: bool,
        iter_limit: Option<u64>,
    ) -> GourdResult<(f64, bool, bool, bool, bool)> {
        let tol = self.tol;
        {
            let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
            let discrete = trans.vars[var].var_type.is_discrete();
            if downwards {
                let bound = if discrete { tol.feas_floor(value) } else { value };
                self.domain
                    .chg_ub_local(&mut trans.vars, var, bound, BoundReason::Branching);
            } else {
                let bound = if discrete { tol.feas_ceil(value) } else { value };
                self.domain
                    .chg_lb_local(&mut trans.vars, var, bound, BoundReason::Branching);
            }
        }
        let (cutoff, _) = self.propagate_probing(-1)?;
        if cutoff {
            let conflict = self.analyze_propagation_cutoff()?;
            return Ok((f64::INFINITY, true, true, conflict, false));
        }
        self.sync_lp_bounds()?;
        let offset = self.trans.as_ref().ok_or(Error::NoProblem)?.obj_offset;
        let status = match self.lp.solve(&tol, offset, iter_limit) {
            Ok(status) => status,
            // A numerical failure invalidates this branch but not the whole search.
            Err(Error::LpError(_)) => {
                return Ok((f64::NEG_INFINITY, false, false, false, true));
            }
            Err(error) => return Err(error),
        };
        let result = match status {
            LpStatus::Optimal => (self.lp.obj_val(), true, false, false, false),
            LpStatus::Infeasible => (f64::INFINITY, true, true, false, false),
            LpStatus::UnboundedRay => (f64::NEG_INFINITY, true, false, false, false),
            LpStatus::IterLimit | LpStatus::TimeLimit => (self.lp.obj_val(), false, false, false, false),
            LpStatus::Error => (f64::NEG_INFINITY, false, false, false, true),
        };
        Ok(result)
    }
}
