//! Driving conflict analysis: seeding the initial bound set, resolving inference events
//! back to their premises, and turning the resulting conflict sets into constraints.

use super::solver::Solver;
use crate::conflict::ConflictBound;
use crate::model::BoundEvent;
use crate::model::BoundReason;
use crate::model::BoundType;
use crate::model::Cons;
use crate::model::ConsId;
use crate::model::VarId;
use crate::plugins::PluginCtx;
use crate::results::Error;
use crate::results::GourdResult;

impl Solver {
    /// Whether conflict analysis is enabled and there is a local frame to analyze.
    pub fn is_conflict_analysis_applicable(&self) -> bool {
        self.params.get_bool("conflict/enable").unwrap_or(false)
            && self.conflict.is_applicable(&self.domain)
    }

    /// Starts a fresh conflict analysis; seed bounds with the `add_conflict_*` operations
    /// and finish with [`Solver::analyze_conflict`].
    pub fn init_conflict_analysis(&mut self) -> GourdResult<()> {
        self.conflict.init(&self.domain)
    }

    pub fn add_conflict_lb(&mut self, var: VarId) -> GourdResult<()> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        self.conflict.add_conflict_lb(&trans.vars, var)
    }

    pub fn add_conflict_ub(&mut self, var: VarId) -> GourdResult<()> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        self.conflict.add_conflict_ub(&trans.vars, var)
    }

    pub fn add_conflict_lb_relaxed(&mut self, var: VarId, value: f64) -> GourdResult<()> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        self.conflict.add_conflict_lb_relaxed(&trans.vars, var, value)
    }

    pub fn add_conflict_ub_relaxed(&mut self, var: VarId, value: f64) -> GourdResult<()> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        self.conflict.add_conflict_ub_relaxed(&trans.vars, var, value)
    }

    pub fn add_conflict_bd(&mut self, var: VarId, bound: BoundType) -> GourdResult<()> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        self.conflict.add_conflict_bd(&trans.vars, var, bound)
    }

    pub fn add_conflict_binvar(&mut self, var: VarId) -> GourdResult<()> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        self.conflict.add_conflict_binvar(&trans.vars, var)
    }

    /// Runs first-UIP resolution on the seeded bounds and hands the conflict set to the
    /// conflict handlers. Returns whether a conflict constraint was created.
    pub fn analyze_conflict(&mut self, validdepth: usize) -> GourdResult<bool> {
        let set = {
            let Solver {
                trans,
                domain,
                conflict,
                conshdlrs,
                propagators,
                ..
            } = self;
            let trans = trans.as_ref().ok_or(Error::NoProblem)?;
            let mut resolver =
                |event: &BoundEvent| -> GourdResult<Option<Vec<ConflictBound>>> {
                    match &event.reason {
                        BoundReason::Branching => Ok(Some(Vec::new())),
                        BoundReason::ConsInference(id) => {
                            let cons = &trans.conss[*id];
                            match conshdlrs.find(&cons.hdlr) {
                                Some(hdlr) => hdlr.resolve_propagation(trans, cons, event),
                                None => Ok(None),
                            }
                        }
                        BoundReason::PropInference(name) => match propagators.find(name) {
                            Some(propagator) => propagator.resolve_propagation(trans, event),
                            None => Ok(None),
                        },
                    }
                };
            conflict.analyze(domain, &mut resolver, validdepth)?
        };
        let Some(set) = set else {
            return Ok(false);
        };

        // Conflict-driven variable statistics feed the branching rules.
        if let Some(trans) = self.trans.as_mut() {
            let length = set.bounds.len() as f64;
            for bound in &set.bounds {
                let var = &mut trans.vars[bound.var];
                var.conflict_length_sum += length;
                var.vsids += 1.0;
            }
        }

        let mut created: Vec<Cons> = Vec::new();
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                conflicthdlrs,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            for hdlr in conflicthdlrs.iter_mut() {
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth: set.conflict_depth,
                };
                if let Some(cons) = hdlr.exec(&mut ctx, &set)? {
                    created.push(cons);
                }
            }
        }
        let any = !created.is_empty();
        for mut cons in created {
            cons.propagate_marked = true;
            let _ = self.add_trans_cons(cons)?;
        }
        Ok(any)
    }

    /// Analyzes a cutoff detected by propagation, seeding from the deepest trail event.
    pub(crate) fn analyze_propagation_cutoff(&mut self) -> GourdResult<bool> {
        if !self.params.get_bool("conflict/enable")? || !self.conflict.is_applicable(&self.domain) {
            return Ok(false);
        }
        let seed = match self.domain.events().last() {
            Some(event) => event.var,
            None => return Ok(false),
        };
        self.conflict.init(&self.domain)?;
        {
            let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
            self.conflict.add_conflict_lb(&trans.vars, seed)?;
            self.conflict.add_conflict_ub(&trans.vars, seed)?;
        }
        self.analyze_conflict(0)
    }

    /// Analyzes an infeasible LP, seeding from all branching bound changes on the trail.
    pub(crate) fn analyze_lp_infeasibility(&mut self) -> GourdResult<bool> {
        if !self.params.get_bool("conflict/enable")? || !self.conflict.is_applicable(&self.domain) {
            return Ok(false);
        }
        self.conflict.init(&self.domain)?;
        let seeds: Vec<(VarId, BoundType)> = self
            .domain
            .events()
            .iter()
            .filter(|event| matches!(event.reason, BoundReason::Branching))
            .map(|event| (event.var, event.bound))
            .collect();
        {
            let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
            for (var, bound) in seeds {
                self.conflict.add_conflict_bd(&trans.vars, var, bound)?;
            }
        }
        self.analyze_conflict(0)
    }

    /// Analyzes an infeasibility witnessed by one constraint, seeding from the bounds its
    /// handler names.
    pub fn analyze_conflict_cons(&mut self, cons: ConsId, validdepth: usize) -> GourdResult<bool> {
        if !self.params.get_bool("conflict/enable")? || !self.conflict.is_applicable(&self.domain) {
            return Ok(false);
        }
        let bounds = {
            let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
            let entry = &trans.conss[cons];
            let hdlr = self
                .conshdlrs
                .find(&entry.hdlr)
                .ok_or_else(|| Error::PluginNotFound(entry.hdlr.clone()))?;
            hdlr.infeasibility_bounds(trans, &self.tol, entry)
        };
        let Some(bounds) = bounds else {
            return Ok(false);
        };
        self.conflict.init(&self.domain)?;
        {
            let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
            for bound in bounds {
                match bound.bound {
                    BoundType::Lower => {
                        self.conflict
                            .add_conflict_lb_relaxed(&trans.vars, bound.var, bound.value)?
                    }
                    BoundType::Upper => {
                        self.conflict
                            .add_conflict_ub_relaxed(&trans.vars, bound.var, bound.value)?
                    }
                }
            }
        }
        self.analyze_conflict(validdepth)
    }
}
