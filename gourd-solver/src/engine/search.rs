//! The branch-and-bound loop: node selection, activation, propagation, LP solving with
//! pricing and separation, enforcement, and branching.

use std::cmp::Reverse;
use std::sync::atomic::Ordering;

use fnv::FnvHashMap;
use itertools::Itertools;
use log::info;

use super::limits;
use super::limits::LimitSnapshot;
use super::solver::conss_by_hdlr;
use super::solver::freq_hits;
use super::solver::BranchRecord;
use super::solver::Solver;
use crate::containers::StorageKey;
use crate::events::Event;
use crate::events::EventType;
use crate::lp::Col;
use crate::lp::ColId;
use crate::lp::LpStatus;
use crate::lp::Row;
use crate::model::BoundReason;
use crate::model::BoundType;
use crate::model::TightenOutcome;
use crate::model::VarId;
use crate::model::VarStatus;
use crate::model::Variable;
use crate::plugins::BranchResult;
use crate::plugins::DisplayView;
use crate::plugins::EnforceResult;
use crate::plugins::HeurResult;
use crate::plugins::HeurTiming;
use crate::plugins::PluginCtx;
use crate::plugins::PropResult;
use crate::plugins::RelaxResult;
use crate::plugins::SepaResult;
use crate::results::Error;
use crate::results::GourdResult;
use crate::results::SolveStatus;
use crate::statistics::log_statistic;
use crate::statistics::log_statistic_postfix;
use crate::statistics::should_log_statistics;
use crate::tree::NodeId;

#[derive(Debug, PartialEq, Eq)]
enum NodeOutcome {
    Done,
    Abort,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PropOutcome {
    Cutoff,
    Reduced,
    Nothing,
}

#[derive(Debug, PartialEq, Eq)]
enum SepaOutcome {
    Nothing,
    Added,
    Cutoff,
}

#[derive(Debug, PartialEq, Eq)]
enum RelaxOutcome {
    Nothing,
    Repropagate,
    Cutoff,
}

#[derive(Debug, PartialEq, Eq)]
enum HdlrVerdict {
    Feasible,
    Cutoff,
    Repropagate,
    Resolve,
    Branched,
    Infeasible,
}

#[derive(Debug, PartialEq, Eq)]
enum EnforceOutcome {
    Feasible,
    Cutoff,
    Branched,
    Resolve,
    Repropagate,
}

#[derive(Debug)]
enum Decision {
    Branch(VarId, f64),
    Cutoff,
    Reduced,
}

impl Solver {
    pub(crate) fn solving_loop(&mut self) -> GourdResult<()> {
        let mut first = true;
        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                self.status = SolveStatus::UserInterrupt;
                break;
            }
            if let Some(limit_status) = self.check_limits() {
                self.status = limit_status;
                break;
            }
            let target = if first {
                first = false;
                Some(self.tree.root())
            } else {
                match self.nodesels.iter_mut().next() {
                    Some(nodesel) => nodesel.select(&self.tree),
                    None => None,
                }
            };
            let Some(target) = target else {
                // Search space exhausted: any incumbent is optimal.
                self.status = if self.primal.n_sols() > 0 {
                    SolveStatus::Optimal
                } else {
                    SolveStatus::Infeasible
                };
                break;
            };
            if !self.activate_node(target)? {
                continue;
            }
            self.n_total_nodes += 1;
            self.nodes_since_best += 1;
            match self.process_focus()? {
                NodeOutcome::Abort => break,
                NodeOutcome::Done => {}
            }
            self.display_progress()?;
        }
        Ok(())
    }

    fn check_limits(&self) -> Option<SolveStatus> {
        let elapsed = self
            .solve_start
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let snapshot = LimitSnapshot {
            n_nodes: self.tree.n_processed,
            n_total_nodes: self.n_total_nodes,
            nodes_since_best: self.nodes_since_best,
            elapsed,
            primal_bound: self.primal.upper_bound(),
            dual_bound: self.tree.lower_bound(),
            n_sols: self.primal.n_sols(),
            n_improvements: self.primal.n_improvements,
        };
        self.limits.check(&snapshot)
    }

    /// Makes `target` the focus node: backtracks the trail to the common ancestor and
    /// replays the branching bound changes along the path down. Returns `false` when the
    /// replay already proves the node infeasible.
    fn activate_node(&mut self, target: NodeId) -> GourdResult<bool> {
        let (ancestor_depth, path) = self.tree.switch_focus(target);
        if self.has_local_rows {
            self.lp.shrink_rows(self.n_permanent_rows);
            self.has_local_rows = false;
        }
        let tol = self.tol;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        if self.domain.current_frame() > ancestor_depth {
            self.domain.backtrack_to(ancestor_depth, &mut trans.vars);
        }
        for &node in &path {
            self.domain.push_frame();
            let changes = self.tree.node(node).domchg.clone();
            for change in changes {
                let outcome = match change.bound {
                    BoundType::Lower => self.domain.tighten_lb_local(
                        &mut trans.vars,
                        &tol,
                        change.var,
                        change.value,
                        BoundReason::Branching,
                    ),
                    BoundType::Upper => self.domain.tighten_ub_local(
                        &mut trans.vars,
                        &tol,
                        change.var,
                        change.value,
                        BoundReason::Branching,
                    ),
                };
                if outcome == TightenOutcome::Infeasible {
                    self.tree.cut_off(target);
                    return Ok(false);
                }
            }
        }
        self.tree.node_mut(target).reprop = false;
        Ok(true)
    }

    fn process_focus(&mut self) -> GourdResult<NodeOutcome> {
        let focus = self.tree.focus();
        let depth = self.tree.node(focus).depth;
        self.emit_event(&Event::Node {
            event: EventType::NodeFocused,
            depth,
        })?;

        if self.tol.is_ge(self.tree.node(focus).lower_bound, self.tree.cutoff_bound) {
            return self.finish_cutoff(focus, depth);
        }

        let prop_maxrounds = self.params.get_int("propagating/maxrounds")?;
        let sepa_maxrounds = self.params.get_int("separating/maxrounds")?;
        let max_cuts = self.params.get_int("separating/maxcuts")? as usize;
        let mut sepa_rounds = 0;

        loop {
            let events_before = self.domain.events().len();
            if self.propagate_rounds(depth, prop_maxrounds, false)? == PropOutcome::Cutoff {
                let _ = self.analyze_propagation_cutoff()?;
                return self.finish_cutoff(focus, depth);
            }
            self.credit_inferences(focus, events_before);

            if !self.lp.is_constructed() {
                self.construct_lp()?;
            }
            self.sync_lp_bounds()?;

            let mut lp_status;
            loop {
                // Pricing and separation can take many rounds; honour an interrupt between
                // them, not just at node boundaries.
                if self.interrupt.load(Ordering::SeqCst) {
                    self.status = SolveStatus::UserInterrupt;
                    return Ok(NodeOutcome::Abort);
                }
                lp_status = self.solve_lp()?;
                match lp_status {
                    LpStatus::Optimal => {
                        let lpobj = self.lp.obj_val();
                        self.update_branch_stats(focus, lpobj);
                        self.tree.update_lower_bound(focus, lpobj);
                        if self.tol.is_ge(lpobj, self.tree.cutoff_bound) {
                            break;
                        }
                        if self.price_round(depth, true)? {
                            continue;
                        }
                        if sepa_maxrounds >= 0 && sepa_rounds >= sepa_maxrounds {
                            break;
                        }
                        sepa_rounds += 1;
                        match self.separate_round(depth, max_cuts)? {
                            SepaOutcome::Cutoff => return self.finish_cutoff(focus, depth),
                            SepaOutcome::Added => continue,
                            SepaOutcome::Nothing => break,
                        }
                    }
                    LpStatus::Infeasible => {
                        if self.price_round(depth, false)? {
                            continue;
                        }
                        break;
                    }
                    _ => break,
                }
            }

            match lp_status {
                LpStatus::Infeasible => {
                    let _ = self.analyze_lp_infeasibility()?;
                    return self.finish_cutoff(focus, depth);
                }
                LpStatus::UnboundedRay => {
                    self.capture_primal_ray();
                    self.status = if depth == 0 {
                        SolveStatus::Unbounded
                    } else {
                        SolveStatus::InfeasibleOrUnbounded
                    };
                    return Ok(NodeOutcome::Abort);
                }
                _ => {}
            }
            let lp_usable = lp_status == LpStatus::Optimal;
            if lp_usable && self.tol.is_ge(self.tree.node(focus).lower_bound, self.tree.cutoff_bound) {
                return self.finish_cutoff(focus, depth);
            }

            match self.relax_round(depth)? {
                RelaxOutcome::Cutoff => return self.finish_cutoff(focus, depth),
                RelaxOutcome::Repropagate => continue,
                RelaxOutcome::Nothing => {}
            }

            self.run_heuristics(
                depth,
                if lp_usable {
                    HeurTiming::AfterLpNode
                } else {
                    HeurTiming::AfterPseudoNode
                },
            )?;

            if self.tol.is_ge(self.tree.node(focus).lower_bound, self.tree.cutoff_bound) {
                return self.finish_cutoff(focus, depth);
            }

            match self.enforce(focus, depth, lp_usable)? {
                EnforceOutcome::Feasible => {
                    self.accept_node_solution(lp_usable)?;
                    self.age_constraints()?;
                    let _ = self.branch_records.remove(&focus);
                    self.emit_event(&Event::Node {
                        event: EventType::NodeFeasible,
                        depth,
                    })?;
                    return Ok(NodeOutcome::Done);
                }
                EnforceOutcome::Cutoff => return self.finish_cutoff(focus, depth),
                EnforceOutcome::Branched => {
                    let _ = self.branch_records.remove(&focus);
                    self.emit_event(&Event::Node {
                        event: EventType::NodeBranched,
                        depth,
                    })?;
                    return Ok(NodeOutcome::Done);
                }
                EnforceOutcome::Resolve | EnforceOutcome::Repropagate => continue,
            }
        }
    }

    fn finish_cutoff(&mut self, focus: NodeId, depth: usize) -> GourdResult<NodeOutcome> {
        self.tree.cut_off(focus);
        if let Some(record) = self.branch_records.remove(&focus) {
            if let Some(trans) = self.trans.as_mut() {
                let var = &mut trans.vars[record.var];
                if record.upwards {
                    var.ncutoffs_up += 1;
                } else {
                    var.ncutoffs_down += 1;
                }
            }
        }
        self.emit_event(&Event::Node {
            event: EventType::NodeInfeasible,
            depth,
        })?;
        Ok(NodeOutcome::Done)
    }

    /// Domain propagation at the focus node: constraint handlers first, then propagators,
    /// repeated until a fixpoint or the round limit.
    pub(crate) fn propagate_rounds(
        &mut self,
        depth: usize,
        maxrounds: i32,
        ignore_freq: bool,
    ) -> GourdResult<PropOutcome> {
        let mut overall = PropOutcome::Nothing;
        let mut round = 0;
        loop {
            if maxrounds >= 0 && round >= maxrounds {
                break;
            }
            round += 1;
            let mut reduced = false;
            let mut cutoff = false;
            {
                let Solver {
                    tol,
                    trans,
                    domain,
                    lp,
                    primal,
                    conshdlrs,
                    propagators,
                    ..
                } = self;
                let trans = trans.as_mut().ok_or(Error::NoProblem)?;

                let by_hdlr = conss_by_hdlr(trans, |cons| cons.should_propagate());
                for ids in by_hdlr.values() {
                    for &id in ids {
                        trans.conss[id].propagate_marked = false;
                    }
                }
                let names: Vec<String> = conshdlrs.names();
                for name in names {
                    let Some(ids) = by_hdlr.get(&name) else { continue };
                    let conss: Vec<_> = ids
                        .iter()
                        .copied()
                        .filter(|&id| trans.conss[id].validdepth <= depth)
                        .collect();
                    if conss.is_empty() {
                        continue;
                    }
                    let Some(hdlr) = conshdlrs.find_mut(&name) else { continue };
                    if !ignore_freq && !freq_hits(hdlr.prop_freq(), depth) {
                        continue;
                    }
                    let mut ctx = PluginCtx {
                        tol: &*tol,
                        trans: &mut *trans,
                        domain: &mut *domain,
                        lp: &mut *lp,
                        primal: &*primal,
                        depth,
                    };
                    match hdlr.propagate(&mut ctx, &conss)? {
                        PropResult::ReducedDom => reduced = true,
                        PropResult::Cutoff => cutoff = true,
                        PropResult::DidNotRun | PropResult::DidNotFind => {}
                    }
                    if cutoff {
                        break;
                    }
                }
                if !cutoff {
                    for propagator in propagators.iter_mut() {
                        if !ignore_freq && !freq_hits(propagator.freq(), depth) {
                            continue;
                        }
                        let mut ctx = PluginCtx {
                            tol: &*tol,
                            trans: &mut *trans,
                            domain: &mut *domain,
                            lp: &mut *lp,
                            primal: &*primal,
                            depth,
                        };
                        match propagator.propagate(&mut ctx)? {
                            PropResult::ReducedDom => reduced = true,
                            PropResult::Cutoff => {
                                cutoff = true;
                                break;
                            }
                            PropResult::DidNotRun | PropResult::DidNotFind => {}
                        }
                    }
                }
            }
            if cutoff {
                return Ok(PropOutcome::Cutoff);
            }
            if reduced {
                overall = PropOutcome::Reduced;
            } else {
                break;
            }
        }
        Ok(overall)
    }

    /// Credits inferred bound changes since `events_before` to the branching variable of the
    /// focus node.
    fn credit_inferences(&mut self, focus: NodeId, events_before: usize) {
        let Some(record) = self.branch_records.get(&focus).copied() else {
            return;
        };
        let inferred = self.domain.events()[events_before..]
            .iter()
            .filter(|event| !matches!(event.reason, BoundReason::Branching))
            .count() as u64;
        if inferred == 0 {
            return;
        }
        if let Some(trans) = self.trans.as_mut() {
            let var = &mut trans.vars[record.var];
            if record.upwards {
                var.ninferences_up += inferred;
            } else {
                var.ninferences_down += inferred;
            }
        }
    }

    /// Builds the root LP: one column per active variable and the initial rows of every
    /// constraint handler.
    fn construct_lp(&mut self) -> GourdResult<()> {
        let depth = self.tree.node(self.tree.focus()).depth;
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                conshdlrs,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            for id in trans.active_var_ids() {
                let var = &mut trans.vars[id];
                let _ = lp.add_col(Col {
                    var: id,
                    obj: var.obj,
                    lb: var.lb_local,
                    ub: var.ub_local,
                    integral: var.var_type.is_discrete(),
                });
                var.status = VarStatus::Column;
            }
            let by_hdlr = conss_by_hdlr(trans, |cons| {
                cons.flags.initial && cons.active && cons.enabled && !cons.deleted
            });
            let names: Vec<String> = conshdlrs.names();
            for name in names {
                let Some(conss) = by_hdlr.get(&name) else { continue };
                let Some(hdlr) = conshdlrs.find_mut(&name) else { continue };
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth,
                };
                hdlr.init_lp(&mut ctx, conss)?;
            }
            lp.mark_constructed();
        }
        self.n_permanent_rows = self.lp.n_rows();
        Ok(())
    }

    /// Pushes the local bounds of all columns into the LP.
    pub(crate) fn sync_lp_bounds(&mut self) -> GourdResult<()> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        for index in 0..self.lp.n_cols() {
            let col = ColId::create_from_index(index);
            let var = self.lp.col(col).var;
            let lb = trans.vars[var].lb_local;
            let ub = trans.vars[var].ub_local;
            self.lp.set_col_bounds(col, lb, ub);
        }
        Ok(())
    }

    pub(crate) fn solve_lp(&mut self) -> GourdResult<LpStatus> {
        let iter_limit = match self.params.get_long("lp/iterlimit")? {
            limit if limit >= 0 => Some(limit as u64),
            _ => None,
        };
        let offset = self.trans.as_ref().ok_or(Error::NoProblem)?.obj_offset;
        let first = self.lp.n_solves == 0;
        let tol = self.tol;
        let status = self.lp.solve(&tol, offset, iter_limit)?;
        self.emit_event(&Event::Lp {
            event: if first {
                EventType::FirstLpSolved
            } else {
                EventType::LpSolved
            },
        })?;
        Ok(status)
    }

    fn separate_round(&mut self, depth: usize, max_cuts: usize) -> GourdResult<SepaOutcome> {
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                conshdlrs,
                separators,
                sepastore,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            let by_hdlr = conss_by_hdlr(trans, |cons| {
                cons.flags.separate && cons.active && cons.enabled && !cons.deleted
            });
            let names: Vec<String> = conshdlrs.names();
            let mut cutoff = false;
            for name in names {
                let Some(conss) = by_hdlr.get(&name) else { continue };
                let Some(hdlr) = conshdlrs.find_mut(&name) else { continue };
                if !freq_hits(hdlr.sepa_freq(), depth) {
                    continue;
                }
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth,
                };
                if hdlr.separate(&mut ctx, conss, sepastore)? == SepaResult::Cutoff {
                    cutoff = true;
                    break;
                }
            }
            if !cutoff {
                for separator in separators.iter_mut() {
                    if !freq_hits(separator.freq(), depth) {
                        continue;
                    }
                    let mut ctx = PluginCtx {
                        tol: &*tol,
                        trans: &mut *trans,
                        domain: &mut *domain,
                        lp: &mut *lp,
                        primal: &*primal,
                        depth,
                    };
                    if separator.exec_lp(&mut ctx, sepastore)? == SepaResult::Cutoff {
                        cutoff = true;
                        break;
                    }
                }
            }
            if cutoff {
                sepastore.clear_cuts();
                return Ok(SepaOutcome::Cutoff);
            }
        }
        // Re-separate the global cut pool against the current LP solution.
        let tol = self.tol;
        let pooled = {
            let lp = &self.lp;
            self.cutpool.separate(&|col| lp.col_primal(col), &tol)
        };
        for row in pooled {
            let lp = &self.lp;
            let _ = self
                .sepastore
                .add_cut(row, &|col| lp.col_primal(col), &tol, false);
        }
        let rows = self.sepastore.take_best(max_cuts);
        if rows.is_empty() {
            return Ok(SepaOutcome::Nothing);
        }
        let _ = self.add_lp_rows(rows)?;
        Ok(SepaOutcome::Added)
    }

    /// Adds separated rows to the LP, keeping globally valid cuts in the pool and tracking
    /// the permanent-row prefix for node switches.
    fn add_lp_rows(&mut self, rows: Vec<Row>) -> GourdResult<usize> {
        let mut added = Vec::new();
        for row in rows {
            let local = row.local;
            if !local {
                self.cutpool.add_cut(row.clone());
            }
            let id = self.lp.add_row(row);
            if local {
                self.has_local_rows = true;
            } else if !self.has_local_rows {
                self.n_permanent_rows = self.lp.n_rows();
            }
            added.push(id);
        }
        let count = added.len();
        for id in added {
            self.emit_event(&Event::Row {
                event: EventType::RowAdded,
                row: id,
            })?;
        }
        Ok(count)
    }

    /// One pricing round. Returns whether new columns entered the LP.
    fn price_round(&mut self, depth: usize, optimal: bool) -> GourdResult<bool> {
        if self.pricers.is_empty() {
            return Ok(false);
        }
        let mut priced = false;
        let mut bound: Option<f64> = None;
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                pricers,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            for pricer in pricers.iter_mut() {
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth,
                };
                let result = if optimal {
                    pricer.redcost(&mut ctx)?
                } else {
                    pricer.farkas(&mut ctx)?
                };
                if result.n_priced > 0 {
                    priced = true;
                }
                if let Some(lb) = result.lowerbound {
                    bound = Some(bound.map_or(lb, |b: f64| b.max(lb)));
                }
                if result.stop_early {
                    break;
                }
            }
        }
        if let Some(lb) = bound {
            let focus = self.tree.focus();
            self.tree.update_lower_bound(focus, lb);
        }
        Ok(priced)
    }

    fn relax_round(&mut self, depth: usize) -> GourdResult<RelaxOutcome> {
        if self.relaxators.is_empty() {
            return Ok(RelaxOutcome::Nothing);
        }
        let mut outcome = RelaxOutcome::Nothing;
        let mut bound: Option<f64> = None;
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                relaxators,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            for relaxator in relaxators.iter_mut() {
                if !freq_hits(relaxator.freq(), depth) {
                    continue;
                }
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth,
                };
                match relaxator.exec(&mut ctx)? {
                    RelaxResult::Lowerbound(lb) => {
                        bound = Some(bound.map_or(lb, |b: f64| b.max(lb)));
                    }
                    RelaxResult::Cutoff => {
                        outcome = RelaxOutcome::Cutoff;
                        break;
                    }
                    RelaxResult::ReducedDom => outcome = RelaxOutcome::Repropagate,
                    RelaxResult::DidNotRun => {}
                }
            }
        }
        if let Some(lb) = bound {
            let focus = self.tree.focus();
            self.tree.update_lower_bound(focus, lb);
        }
        Ok(outcome)
    }

    pub(crate) fn run_heuristics(&mut self, depth: usize, timing: HeurTiming) -> GourdResult<()> {
        let global_freq = self.params.get_int("heuristics/freq")?;
        if !freq_hits(global_freq, depth) {
            return Ok(());
        }
        let mut found: Vec<crate::primal::Solution> = Vec::new();
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                heuristics,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            for heur in heuristics.iter_mut() {
                if !heur.timing().contains(timing) || !heur.should_run(depth) {
                    continue;
                }
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth,
                };
                let (result, sols) = heur.exec(&mut ctx)?;
                if result == HeurResult::FoundSol {
                    found.extend(sols);
                }
            }
        }
        for sol in found {
            let _ = self.try_sol(sol)?;
        }
        Ok(())
    }

    /// Enforces the node solution. Fractional LP values are handled by branching directly;
    /// everything else goes through the constraint handlers in enforcement order.
    fn enforce(&mut self, focus: NodeId, depth: usize, lp_usable: bool) -> GourdResult<EnforceOutcome> {
        if lp_usable {
            let candidates = self.fractional_candidates();
            if !candidates.is_empty() {
                return self.branch_on_lp(focus, depth, &candidates);
            }
        }
        let order: Vec<String> = self
            .conshdlrs
            .iter()
            .map(|hdlr| (hdlr.name().to_owned(), hdlr.enforce_priority()))
            .sorted_by_key(|&(_, priority)| Reverse(priority))
            .map(|(name, _)| name)
            .collect();
        let mut verdict = HdlrVerdict::Feasible;
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                conshdlrs,
                sepastore,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            let by_hdlr = conss_by_hdlr(trans, |cons| {
                cons.flags.enforce && cons.active && cons.enabled && !cons.deleted
            });
            'handlers: for name in order {
                let Some(ids) = by_hdlr.get(&name) else { continue };
                let conss: Vec<_> = ids
                    .iter()
                    .copied()
                    .filter(|&id| trans.conss[id].validdepth <= depth)
                    .collect();
                if conss.is_empty() {
                    continue;
                }
                let Some(hdlr) = conshdlrs.find_mut(&name) else { continue };
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth,
                };
                let result = if lp_usable {
                    hdlr.enforce_lp(&mut ctx, &conss, sepastore)?
                } else {
                    hdlr.enforce_pseudo(&mut ctx, &conss)?
                };
                match result {
                    EnforceResult::Feasible => {}
                    EnforceResult::Cutoff => {
                        verdict = HdlrVerdict::Cutoff;
                        break 'handlers;
                    }
                    EnforceResult::ReducedDom => {
                        verdict = HdlrVerdict::Repropagate;
                        break 'handlers;
                    }
                    EnforceResult::Separated => {
                        verdict = HdlrVerdict::Resolve;
                        break 'handlers;
                    }
                    EnforceResult::Branched => {
                        verdict = HdlrVerdict::Branched;
                        break 'handlers;
                    }
                    EnforceResult::Infeasible => {
                        verdict = HdlrVerdict::Infeasible;
                        break 'handlers;
                    }
                }
            }
        }
        match verdict {
            HdlrVerdict::Feasible => Ok(EnforceOutcome::Feasible),
            HdlrVerdict::Cutoff => Ok(EnforceOutcome::Cutoff),
            HdlrVerdict::Repropagate => Ok(EnforceOutcome::Repropagate),
            HdlrVerdict::Branched => Ok(EnforceOutcome::Branched),
            HdlrVerdict::Resolve => {
                // Forced rows from enforcement enter the LP unconditionally.
                let rows = self.sepastore.take_best(0);
                let _ = self.add_lp_rows(rows)?;
                Ok(EnforceOutcome::Resolve)
            }
            HdlrVerdict::Infeasible => self.branch_on_pseudo(focus, depth),
        }
    }

    /// Integral columns with fractional LP values, as `(var, value, fractionality)`.
    fn fractional_candidates(&self) -> Vec<(VarId, f64, f64)> {
        let mut candidates = Vec::new();
        for index in 0..self.lp.n_cols() {
            let col = ColId::create_from_index(index);
            let entry = self.lp.col(col);
            if !entry.integral {
                continue;
            }
            let value = self.lp.col_primal(col);
            if !self.tol.is_integral(value) {
                candidates.push((entry.var, value, self.tol.frac(value)));
            }
        }
        candidates
    }

    fn branch_on_lp(
        &mut self,
        focus: NodeId,
        depth: usize,
        candidates: &[(VarId, f64, f64)],
    ) -> GourdResult<EnforceOutcome> {
        let mut decision: Option<Decision> = None;
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                branchrules,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            for rule in branchrules.iter_mut() {
                if rule.maxdepth() >= 0 && depth as i32 > rule.maxdepth() {
                    continue;
                }
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth,
                };
                match rule.exec_lp(&mut ctx, candidates)? {
                    BranchResult::DidNotRun => continue,
                    BranchResult::Branched { var, value } => {
                        decision = Some(Decision::Branch(var, value));
                        break;
                    }
                    BranchResult::Cutoff => {
                        decision = Some(Decision::Cutoff);
                        break;
                    }
                    BranchResult::ReducedDom => {
                        decision = Some(Decision::Reduced);
                        break;
                    }
                }
            }
        }
        match decision {
            Some(Decision::Cutoff) => Ok(EnforceOutcome::Cutoff),
            Some(Decision::Reduced) => Ok(EnforceOutcome::Repropagate),
            Some(Decision::Branch(var, value)) => {
                self.apply_branching(focus, var, value)?;
                Ok(EnforceOutcome::Branched)
            }
            None => {
                let &(var, value, _) = candidates.first().ok_or(Error::BranchError)?;
                self.apply_branching(focus, var, value)?;
                Ok(EnforceOutcome::Branched)
            }
        }
    }

    fn branch_on_pseudo(&mut self, focus: NodeId, depth: usize) -> GourdResult<EnforceOutcome> {
        let candidates: Vec<VarId> = {
            let tol = self.tol;
            let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
            trans
                .active_var_ids()
                .into_iter()
                .filter(|&id| {
                    trans.vars[id].var_type.is_discrete() && !trans.vars[id].is_locally_fixed(&tol)
                })
                .collect()
        };
        if candidates.is_empty() {
            return Err(Error::BranchError);
        }
        let mut decision: Option<Decision> = None;
        {
            let Solver {
                tol,
                trans,
                domain,
                lp,
                primal,
                branchrules,
                ..
            } = self;
            let trans = trans.as_mut().ok_or(Error::NoProblem)?;
            for rule in branchrules.iter_mut() {
                if rule.maxdepth() >= 0 && depth as i32 > rule.maxdepth() {
                    continue;
                }
                let mut ctx = PluginCtx {
                    tol: &*tol,
                    trans: &mut *trans,
                    domain: &mut *domain,
                    lp: &mut *lp,
                    primal: &*primal,
                    depth,
                };
                match rule.exec_pseudo(&mut ctx, &candidates)? {
                    BranchResult::DidNotRun => continue,
                    BranchResult::Branched { var, value } => {
                        decision = Some(Decision::Branch(var, value));
                        break;
                    }
                    BranchResult::Cutoff => {
                        decision = Some(Decision::Cutoff);
                        break;
                    }
                    BranchResult::ReducedDom => {
                        decision = Some(Decision::Reduced);
                        break;
                    }
                }
            }
        }
        match decision {
            Some(Decision::Cutoff) => Ok(EnforceOutcome::Cutoff),
            Some(Decision::Reduced) => Ok(EnforceOutcome::Repropagate),
            Some(Decision::Branch(var, value)) => {
                self.apply_branching(focus, var, value)?;
                Ok(EnforceOutcome::Branched)
            }
            None => {
                let var = candidates[0];
                self.apply_branching(focus, var, f64::NAN)?;
                Ok(EnforceOutcome::Branched)
            }
        }
    }

    /// Creates the children of a branching decision and records them for pseudocost
    /// crediting. A fractional value splits the domain in two; an integral value of a
    /// discrete variable strictly inside its domain gets a third, equality child.
    fn apply_branching(&mut self, focus: NodeId, var: VarId, value: f64) -> GourdResult<()> {
        if self.tree.node(focus).depth >= crate::tree::MAX_DEPTH {
            return Err(Error::MaxDepthLevel);
        }
        let tol = self.tol;
        let (discrete, value, lb_local, ub_local) = {
            let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
            let v = &trans.vars[var];
            let discrete = v.var_type.is_discrete();
            let value = if value.is_finite() { value } else { branch_point(v) };
            (discrete, value, v.lb_local, v.ub_local)
        };
        let node_lb = self.tree.node(focus).lower_bound;
        let value = if discrete && tol.is_integral(value) {
            let point = value.round();
            if point - 1.0 >= lb_local && point + 1.0 <= ub_local {
                let (down, _eq, up) = self.tree.branch_val(var, point, node_lb, node_lb, &tol);
                self.record_branch(down, var, 0.5, node_lb, false);
                self.record_branch(up, var, 0.5, node_lb, true);
                return Ok(());
            }
            // The integral point sits at a domain end; only one adjacent interval exists,
            // so shift to its midpoint and split in two.
            if point + 1.0 <= ub_local {
                point + 0.5
            } else {
                point - 0.5
            }
        } else {
            value
        };
        let frac = {
            let f = tol.frac(value);
            if f <= tol.feastol {
                0.5
            } else {
                f
            }
        };
        let (down, up) = self
            .tree
            .branch_frac(var, value, discrete, node_lb, node_lb, &tol);
        self.record_branch(down, var, frac, node_lb, false);
        self.record_branch(up, var, frac, node_lb, true);
        Ok(())
    }

    fn record_branch(&mut self, node: NodeId, var: VarId, frac: f64, parent_obj: f64, upwards: bool) {
        let _ = self.branch_records.insert(
            node,
            BranchRecord {
                var,
                frac,
                parent_obj,
                upwards,
                scored: false,
            },
        );
    }

    /// Updates the pseudocosts of the branching variable from the first LP bound of the
    /// child.
    fn update_branch_stats(&mut self, focus: NodeId, lpobj: f64) {
        let record = match self.branch_records.get_mut(&focus) {
            Some(record) if !record.scored => {
                record.scored = true;
                *record
            }
            _ => return,
        };
        let delta = (lpobj - record.parent_obj).max(0.0);
        if !delta.is_finite() {
            return;
        }
        if let Some(trans) = self.trans.as_mut() {
            let var = &mut trans.vars[record.var];
            if record.upwards {
                var.pseudocost_up.update(delta, 1.0 - record.frac);
            } else {
                var.pseudocost_down.update(delta, record.frac);
            }
        }
    }

    fn capture_primal_ray(&mut self) {
        let mut ray = FnvHashMap::default();
        for index in 0..self.lp.n_cols() {
            let col = ColId::create_from_index(index);
            let value = self.lp.ray_value(col);
            if value != 0.0 {
                let _ = ray.insert(self.lp.col(col).var, value);
            }
        }
        self.primal.set_ray(ray);
    }

    fn accept_node_solution(&mut self, lp_usable: bool) -> GourdResult<()> {
        let sol = if lp_usable {
            self.create_lp_sol()?
        } else {
            self.create_pseudo_sol()?
        };
        let _ = self.try_sol(sol)?;
        Ok(())
    }

    /// Ages dynamic constraints and disables removable ones that went unused too long.
    fn age_constraints(&mut self) -> GourdResult<()> {
        let agelimit = self.cutpool.agelimit;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        let ids: Vec<_> = trans.conss.keys().collect();
        for id in ids {
            let cons = &mut trans.conss[id];
            if cons.deleted || !cons.flags.dynamic {
                continue;
            }
            cons.incr_age();
            if cons.flags.removable && cons.age > agelimit {
                cons.enabled = false;
            }
        }
        Ok(())
    }

    fn display_progress(&mut self) -> GourdResult<()> {
        let verblevel = self.params.get_int("display/verblevel")?;
        let freq = self.params.get_int("display/freq")?;
        if verblevel < 4 || freq < 0 || self.displays.is_empty() {
            return Ok(());
        }
        if freq > 0 && self.tree.n_processed % freq as u64 != 0 {
            return Ok(());
        }
        let view = DisplayView {
            n_nodes: self.tree.n_processed,
            n_open: self.tree.n_open(),
            n_lp_iterations: self.lp.n_iterations,
            n_sols: self.primal.n_sols(),
            lower_bound: self.tree.lower_bound(),
            upper_bound: self.primal.upper_bound(),
            gap: limits::gap(self.primal.upper_bound(), self.tree.lower_bound()),
            depth: self.tree.node(self.tree.focus()).depth,
        };
        if self.display_rows % 15 == 0 {
            let header = self
                .displays
                .iter()
                .map(|column| format!("{:>width$}", column.header(), width = column.width()))
                .join(" | ");
            info!("{header}");
        }
        self.display_rows += 1;
        let row = self
            .displays
            .iter()
            .map(|column| format!("{:>width$}", column.render(&view), width = column.width()))
            .join(" | ");
        info!("{row}");
        Ok(())
    }

    pub(crate) fn log_end_statistics(&self) {
        if !should_log_statistics() {
            return;
        }
        log_statistic("nodes", self.tree.n_processed);
        log_statistic("totalNodes", self.n_total_nodes);
        log_statistic("lpSolves", self.lp.n_solves);
        log_statistic("lpIterations", self.lp.n_iterations);
        log_statistic("strongBranches", self.lp.n_strongbranches);
        log_statistic("solutionsFound", self.primal.n_found);
        log_statistic("bestObjective", self.primal.upper_bound());
        log_statistic("dualBound", self.tree.lower_bound());
        log_statistic("conflictSets", self.conflict.n_conflict_sets);
        log_statistic("cutsPooled", self.cutpool.n_added);
        log_statistic("restarts", self.n_restarts);
        log_statistic_postfix();
    }
}

/// A finite point to split an unfixed domain at when the branching rule named no value.
fn branch_point(var: &Variable) -> f64 {
    let (lb, ub) = (var.lb_local, var.ub_local);
    if lb.is_finite() && ub.is_finite() {
        (lb + ub) / 2.0
    } else if lb.is_finite() {
        lb + 0.5
    } else if ub.is_finite() {
        ub - 0.5
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::*;
    use crate::model::VarType;
    use crate::plugins::Named;
    use crate::plugins::Separator;
    use crate::sepa::SepaStorage;

    fn integer_solver() -> (Solver, VarId) {
        let mut solver = Solver::default();
        solver.create_prob("p").unwrap();
        let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
        solver.transform().unwrap();
        (solver, x)
    }

    #[test]
    fn integral_branch_values_create_an_equality_child() {
        let (mut solver, x) = integer_solver();
        let focus = solver.tree.focus();
        solver.apply_branching(focus, x, 4.0).unwrap();
        assert_eq!(3, solver.tree.n_open());
        let fixed = solver.tree.open().iter().any(|&node| {
            let changes = &solver.tree.node(node).domchg;
            changes.len() == 2 && changes.iter().all(|change| change.value == 4.0)
        });
        assert!(fixed, "no child fixes the variable at the branch value");
    }

    #[test]
    fn integral_branch_values_at_a_domain_end_split_in_two() {
        let (mut solver, x) = integer_solver();
        let focus = solver.tree.focus();
        solver.apply_branching(focus, x, 0.0).unwrap();
        assert_eq!(2, solver.tree.n_open());
    }

    #[test]
    fn branching_below_the_depth_limit_is_refused() {
        let (mut solver, x) = integer_solver();
        let focus = solver.tree.focus();
        solver.tree.node_mut(focus).depth = crate::tree::MAX_DEPTH;
        assert!(matches!(
            solver.apply_branching(focus, x, 1.5),
            Err(Error::MaxDepthLevel)
        ));
    }

    /// Adds a harmless forced cut every round, so separation never settles on its own.
    struct PaddingSepa {
        flag: Arc<AtomicBool>,
        n: usize,
    }

    impl Named for PaddingSepa {
        fn name(&self) -> &str {
            "padding"
        }
    }

    impl Separator for PaddingSepa {
        fn exec_lp(
            &mut self,
            ctx: &mut PluginCtx<'_>,
            storage: &mut SepaStorage,
        ) -> GourdResult<SepaResult> {
            self.n += 1;
            let row = Row {
                name: format!("pad_{}", self.n),
                lhs: f64::NEG_INFINITY,
                rhs: 100.0 + self.n as f64,
                terms: vec![(ColId::create_from_index(0), 1.0)],
                constant: 0.0,
                local: true,
                removable: true,
                modifiable: false,
                age: 0.0,
                rank: 1,
            };
            let lp = &*ctx.lp;
            let _ = storage.add_cut(row, &|col| lp.col_primal(col), ctx.tol, true);
            self.flag.store(true, Ordering::SeqCst);
            Ok(SepaResult::Separated)
        }
    }

    #[test]
    fn an_interrupt_is_honoured_between_separation_rounds() {
        let mut solver = Solver::default();
        let flag = solver.interrupt_flag();
        solver
            .include_separator(Box::new(PaddingSepa { flag, n: 0 }))
            .unwrap();
        solver.create_prob("p").unwrap();
        let x = solver
            .create_var("x", 0.0, f64::INFINITY, 1.0, VarType::Continuous)
            .unwrap();
        let y = solver
            .create_var("y", 0.0, f64::INFINITY, 1.0, VarType::Continuous)
            .unwrap();
        solver
            .add_linear_cons("c", &[(x, 1.0), (y, 1.0)], 3.0, f64::INFINITY)
            .unwrap();
        solver.solve().unwrap();
        assert_eq!(SolveStatus::UserInterrupt, solver.status());
        assert_eq!(0, solver.n_sols());
    }

    #[test]
    fn branch_point_prefers_the_midpoint() {
        let var = Variable::new("x", 0.0, 10.0, 0.0, crate::model::VarType::Continuous);
        assert_eq!(5.0, branch_point(&var));

        let half_open = Variable::new("y", 2.0, f64::INFINITY, 0.0, crate::model::VarType::Continuous);
        assert_eq!(2.5, branch_point(&half_open));

        let free = Variable::new("z", f64::NEG_INFINITY, f64::INFINITY, 0.0, crate::model::VarType::Continuous);
        assert_eq!(0.0, branch_point(&free));
    }
}
