//! The solver facade.
//!
//! One [`Solver`] owns the complete state of an instance: the original and transformed
//! problems, the domain trail, the LP relaxation, the search tree, the solution pool, and
//! the thirteen plugin registries. Every public operation first checks the lifecycle stage
//! it is legal in; an illegal call fails with [`Error::InvalidCall`] and leaves the state
//! untouched.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use enumset::EnumSet;
use fnv::FnvHashMap;
use itertools::Itertools;

use super::limits::Limits;
use super::stage::Stage;
use super::stage::StageMachine;
use crate::conflict::ConflictAnalysis;
use crate::events::Event;
use crate::events::EventFilter;
use crate::events::EventType;
use crate::events::FilterPos;
use crate::io;
use crate::lp::Lp;
use crate::lp::RowId;
use crate::model::BoundReason;
use crate::model::Cons;
use crate::model::ConsFlags;
use crate::model::ConsId;
use crate::model::DomainState;
use crate::model::ObjSense;
use crate::model::Problem;
use crate::model::TightenOutcome;
use crate::model::VarId;
use crate::model::VarStatus;
use crate::model::VarType;
use crate::model::Variable;
use crate::num::Tolerances;
use crate::params::Emphasis;
use crate::params::ParamSet;
use crate::plugins::builtin;
use crate::plugins::BranchRule;
use crate::plugins::CheckResult;
use crate::plugins::ConflictHdlr;
use crate::plugins::ConsHdlr;
use crate::plugins::DisplayColumn;
use crate::plugins::EventHdlr;
use crate::plugins::Heuristic;
use crate::plugins::NodeSel;
use crate::plugins::PluginCtx;
use crate::plugins::PresolResult;
use crate::plugins::Presolver;
use crate::plugins::Pricer;
use crate::plugins::Propagator;
use crate::plugins::Reader;
use crate::plugins::Registry;
use crate::plugins::Relaxator;
use crate::plugins::Separator;
use crate::primal::Primal;
use crate::primal::SolOrigin;
use crate::primal::Solution;
use crate::results::Error;
use crate::results::GourdResult;
use crate::results::SolveStatus;
use crate::sepa::CutPool;
use crate::sepa::SepaStorage;
use crate::tree::NodeId;
use crate::tree::Tree;

/// Bookkeeping for one pending branching child: which variable the parent branched on, in
/// which direction, and at what fractionality, so the first LP solve of the child can be
/// credited to the variable's pseudocosts.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BranchRecord {
    pub(crate) var: VarId,
    pub(crate) frac: f64,
    pub(crate) parent_obj: f64,
    pub(crate) upwards: bool,
    pub(crate) scored: bool,
}

/// A constraint integer programming solver.
///
/// ```
/// use gourd_solver::Solver;
/// use gourd_solver::SolveStatus;
/// # use gourd_solver::results::GourdResult;
/// # fn main() -> GourdResult<()> {
/// let mut solver = Solver::default();
/// solver.create_prob("example")?;
/// # Ok(())
/// # }
/// ```
pub struct Solver {
    pub(crate) stage: StageMachine,
    pub(crate) status: SolveStatus,
    pub tol: Tolerances,
    pub params: ParamSet,
    pub(crate) orig: Option<Problem>,
    pub(crate) trans: Option<Problem>,
    pub(crate) domain: DomainState,
    pub(crate) lp: Lp,
    pub(crate) tree: Tree,
    pub(crate) primal: Primal,
    pub(crate) sepastore: SepaStorage,
    pub(crate) cutpool: CutPool,
    pub(crate) conflict: ConflictAnalysis,
    pub(crate) filter: EventFilter,
    pub(crate) conshdlrs: Registry<dyn ConsHdlr>,
    pub(crate) propagators: Registry<dyn Propagator>,
    pub(crate) presolvers: Registry<dyn Presolver>,
    pub(crate) separators: Registry<dyn Separator>,
    pub(crate) heuristics: Registry<dyn Heuristic>,
    pub(crate) branchrules: Registry<dyn BranchRule>,
    pub(crate) nodesels: Registry<dyn NodeSel>,
    pub(crate) conflicthdlrs: Registry<dyn ConflictHdlr>,
    pub(crate) eventhdlrs: Registry<dyn EventHdlr>,
    pub(crate) pricers: Registry<dyn Pricer>,
    pub(crate) relaxators: Registry<dyn Relaxator>,
    pub(crate) readers: Registry<dyn Reader>,
    pub(crate) displays: Registry<dyn DisplayColumn>,
    pub(crate) interrupt: Arc<AtomicBool>,
    /// The trail frame probing started from, `None` outside probing.
    pub(crate) probing_base: Option<usize>,
    pub(crate) branch_records: FnvHashMap<NodeId, BranchRecord>,
    pub(crate) limits: Limits,
    pub(crate) solve_start: Option<Instant>,
    pub(crate) n_total_nodes: u64,
    pub(crate) nodes_since_best: u64,
    pub(crate) n_restarts: u32,
    /// All objective contributions are integral, so the cutoff can be strengthened.
    pub(crate) obj_integral: bool,
    /// The user objective limit mapped into transformed space, `INFINITY` when unset.
    pub(crate) obj_limit: f64,
    /// Rows below this count survive a node switch; local rows above it are dropped.
    pub(crate) n_permanent_rows: usize,
    pub(crate) has_local_rows: bool,
    pub(crate) display_rows: u64,
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("stage", &self.stage.stage())
            .field("status", &self.status)
            .field("orig", &self.orig.as_ref().map(|problem| &problem.name))
            .field("trans", &self.trans.as_ref().map(|problem| &problem.name))
            .field("n_nodes", &self.tree.n_processed)
            .field("n_sols", &self.primal.n_sols())
            .finish()
    }
}

impl Default for Solver {
    fn default() -> Self {
        Solver::new().expect("registering the builtin plugin suite cannot fail")
    }
}

macro_rules! plugin_ops {
    ($field:ident, $trait_:ty, $include:ident, $set_priority:ident, $priority_of:ident, $names:ident) => {
        impl Solver {
            pub fn $include(&mut self, plugin: Box<$trait_>) -> GourdResult<()> {
                if !self.stage.stage().allows_plugin_registration() {
                    return Err(Error::InvalidCall {
                        operation: stringify!($include),
                        stage: self.stage.stage(),
                    });
                }
                self.$field.include(plugin)
            }

            pub fn $set_priority(&mut self, name: &str, priority: i32) -> GourdResult<()> {
                self.$field.set_priority(name, priority)
            }

            pub fn $priority_of(&self, name: &str) -> Option<i32> {
                self.$field.priority_of(name)
            }

            pub fn $names(&self) -> Vec<String> {
                self.$field.names()
            }
        }
    };
}

plugin_ops!(
    conshdlrs,
    dyn ConsHdlr,
    include_conshdlr,
    set_conshdlr_priority,
    conshdlr_priority_of,
    conshdlr_names
);
plugin_ops!(
    propagators,
    dyn Propagator,
    include_propagator,
    set_propagator_priority,
    propagator_priority_of,
    propagator_names
);
plugin_ops!(
    presolvers,
    dyn Presolver,
    include_presolver,
    set_presolver_priority,
    presolver_priority_of,
    presolver_names
);
plugin_ops!(
    separators,
    dyn Separator,
    include_separator,
    set_separator_priority,
    separator_priority_of,
    separator_names
);
plugin_ops!(
    heuristics,
    dyn Heuristic,
    include_heuristic,
    set_heuristic_priority,
    heuristic_priority_of,
    heuristic_names
);
plugin_ops!(
    branchrules,
    dyn BranchRule,
    include_branchrule,
    set_branchrule_priority,
    branchrule_priority_of,
    branchrule_names
);
plugin_ops!(
    nodesels,
    dyn NodeSel,
    include_nodesel,
    set_nodesel_priority,
    nodesel_priority_of,
    nodesel_names
);
plugin_ops!(
    conflicthdlrs,
    dyn ConflictHdlr,
    include_conflicthdlr,
    set_conflicthdlr_priority,
    conflicthdlr_priority_of,
    conflicthdlr_names
);
plugin_ops!(
    eventhdlrs,
    dyn EventHdlr,
    include_eventhdlr,
    set_eventhdlr_priority,
    eventhdlr_priority_of,
    eventhdlr_names
);
plugin_ops!(
    pricers,
    dyn Pricer,
    include_pricer,
    set_pricer_priority,
    pricer_priority_of,
    pricer_names
);
plugin_ops!(
    relaxators,
    dyn Relaxator,
    include_relaxator,
    set_relaxator_priority,
    relaxator_priority_of,
    relaxator_names
);
plugin_ops!(
    readers,
    dyn Reader,
    include_reader,
    set_reader_priority,
    reader_priority_of,
    reader_names
);
plugin_ops!(
    displays,
    dyn DisplayColumn,
    include_display,
    set_display_priority,
    display_priority_of,
    display_names
);

/// Groups the constraints that pass the filter by their handler name.
pub(crate) fn conss_by_hdlr(
    trans: &Problem,
    keep: impl Fn(&Cons) -> bool,
) -> FnvHashMap<String, Vec<ConsId>> {
    let mut grouped: FnvHashMap<String, Vec<ConsId>> = FnvHashMap::default();
    for id in trans.conss.keys() {
        let cons = &trans.conss[id];
        if keep(cons) {
            grouped.entry(cons.hdlr.clone()).or_default().push(id);
        }
    }
    grouped
}

/// Whether a depth-frequency fires at this depth: -1 never, 0 at the root only, `f` at every
/// depth divisible by `f`.
pub(crate) fn freq_hits(freq: i32, depth: usize) -> bool {
    match freq {
        0 => depth == 0,
        f if f < 0 => false,
        f => depth % (f as usize) == 0,
    }
}

impl Solver {
    /// A solver with the builtin plugin suite and parameter set registered.
    pub fn new() -> GourdResult<Solver> {
        let mut solver = Solver {
            stage: StageMachine::default(),
            status: SolveStatus::default(),
            tol: Tolerances::default(),
            params: ParamSet::default(),
            orig: None,
            trans: None,
            domain: DomainState::default(),
            lp: Lp::default(),
            tree: Tree::default(),
            primal: Primal::default(),
            sepastore: SepaStorage::default(),
            cutpool: CutPool::new(80.0),
            conflict: ConflictAnalysis::default(),
            filter: EventFilter::default(),
            conshdlrs: Registry::default(),
            propagators: Registry::default(),
            presolvers: Registry::default(),
            separators: Registry::default(),
            heuristics: Registry::default(),
            branchrules: Registry::default(),
            nodesels: Registry::default(),
            conflicthdlrs: Registry::default(),
            eventhdlrs: Registry::default(),
            pricers: Registry::default(),
            relaxators: Registry::default(),
            readers: Registry::default(),
            displays: Registry::default(),
            interrupt: Arc::new(AtomicBool::new(false)),
            probing_base: None,
            branch_records: FnvHashMap::default(),
            limits: Limits::default(),
            solve_start: None,
            n_total_nodes: 0,
            nodes_since_best: 0,
            n_restarts: 0,
            obj_integral: false,
            obj_limit: f64::INFINITY,
            n_permanent_rows: 0,
            has_local_rows: false,
            display_rows: 0,
        };
        solver.register_params()?;
        solver.register_builtins()?;
        Ok(solver)
    }

    fn register_params(&mut self) -> GourdResult<()> {
        let params = &mut self.params;
        params.add_real("limits/time", "solving time limit in seconds", 1e20, 0.0, 1e20)?;
        params.add_long(
            "limits/nodes",
            "node limit of one solve call (-1: unlimited)",
            -1,
            -1,
            i64::MAX,
        )?;
        params.add_long(
            "limits/totalnodes",
            "node limit across restarts (-1: unlimited)",
            -1,
            -1,
            i64::MAX,
        )?;
        params.add_long(
            "limits/stallnodes",
            "stop after this many nodes without incumbent improvement (-1: unlimited)",
            -1,
            -1,
            i64::MAX,
        )?;
        params.add_real("limits/gap", "stop when the relative gap drops below this", 0.0, 0.0, 1e20)?;
        params.add_int(
            "limits/solutions",
            "stop after this many solutions (-1: unlimited)",
            -1,
            -1,
            i32::MAX,
        )?;
        params.add_int(
            "limits/bestsol",
            "stop after this many incumbent improvements (-1: unlimited)",
            -1,
            -1,
            i32::MAX,
        )?;
        params.add_int("limits/maxsol", "capacity of the solution pool", 100, 1, i32::MAX)?;
        params.add_real(
            "limits/objective",
            "only solutions strictly better than this objective value count",
            1e20,
            -1e20,
            1e20,
        )?;
        params.add_bool("conflict/enable", "analyze infeasible nodes into conflict constraints", true)?;
        params.add_int(
            "heuristics/freq",
            "depth frequency of primal heuristics (-1: off, 0: root only)",
            1,
            -1,
            i32::MAX,
        )?;
        params.add_int(
            "presolving/maxrounds",
            "maximal presolving rounds (-1: unlimited)",
            -1,
            -1,
            i32::MAX,
        )?;
        params.add_real(
            "presolving/restartfac",
            "fraction of changed bounds that triggers a restart recommendation",
            0.05,
            0.0,
            1.0,
        )?;
        params.add_int(
            "propagating/maxrounds",
            "maximal propagation rounds per node (-1: unlimited)",
            100,
            -1,
            i32::MAX,
        )?;
        params.add_int(
            "separating/maxrounds",
            "maximal separation rounds per node (-1: unlimited)",
            5,
            -1,
            i32::MAX,
        )?;
        params.add_int("separating/maxcuts", "maximal cuts entering the LP per round", 100, 0, i32::MAX)?;
        params.add_real(
            "separating/minefficacy",
            "minimal efficacy of a cut entering the LP",
            0.05,
            0.0,
            1e20,
        )?;
        params.add_real("separating/cutagelimit", "age at which unused cuts are evicted", 80.0, 0.0, 1e20)?;
        params.add_long("lp/iterlimit", "simplex iteration limit per LP solve (-1: unlimited)", -1, -1, i64::MAX)?;
        params.add_int(
            "lp/resolveiterlimit",
            "iteration limit of LP resolves (-1: unlimited)",
            -1,
            -1,
            i32::MAX,
        )?;
        params.add_bool("misc/exactsolve", "favour exactness over speed where implemented", false)?;
        params.add_int("display/freq", "node frequency of progress rows (-1: off)", 100, -1, i32::MAX)?;
        params.add_int("display/verblevel", "verbosity of the progress display", 4, 0, 5)?;
        Ok(())
    }

    fn register_builtins(&mut self) -> GourdResult<()> {
        self.conshdlrs.include(Box::new(builtin::LinearConsHdlr::default()))?;
        self.presolvers.include(Box::new(builtin::TrivialPresol::default()))?;
        self.heuristics.include(Box::new(builtin::RoundingHeur::default()))?;
        self.heuristics.include(Box::new(builtin::FracDiving::default()))?;
        self.branchrules.include(Box::new(builtin::MostFracBranching::default()))?;
        self.nodesels.include(Box::new(builtin::BestBoundSel))?;
        self.nodesels.include(Box::new(builtin::DfsSel))?;
        self.conflicthdlrs.include(Box::new(builtin::LinearConflictHdlr::default()))?;
        self.readers.include(Box::new(builtin::CipReader))?;
        self.displays.include(Box::new(builtin::NodesColumn))?;
        self.displays.include(Box::new(builtin::OpenColumn))?;
        self.displays.include(Box::new(builtin::DualColumn))?;
        self.displays.include(Box::new(builtin::PrimalColumn))?;
        self.displays.include(Box::new(builtin::GapColumn))?;
        Ok(())
    }

    pub fn stage(&self) -> Stage {
        self.stage.stage()
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// Nodes processed during the current solve.
    pub fn n_nodes(&self) -> u64 {
        self.tree.n_processed
    }

    pub fn n_restarts(&self) -> u32 {
        self.n_restarts
    }

    /// Requests an interrupt; the solving loop honours it at the next node boundary.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    /// The interrupt flag, shareable with signal handlers.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    // ------------------------------------------------------------------
    // Problem construction.
    // ------------------------------------------------------------------

    /// Creates an empty problem and enters the problem stage.
    pub fn create_prob(&mut self, name: &str) -> GourdResult<()> {
        self.stage.require("create_prob", &[Stage::Init])?;
        self.orig = Some(Problem::new(name, false));
        self.status = SolveStatus::Unknown;
        self.stage.advance(Stage::Problem);
        Ok(())
    }

    /// Reads a problem from a file, choosing the reader by file extension.
    pub fn read_prob(&mut self, path: &Path) -> GourdResult<()> {
        self.stage.require("read_prob", &[Stage::Init])?;
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        let reader = self
            .readers
            .iter()
            .find(|reader| reader.extension() == extension)
            .ok_or_else(|| Error::ReadError(format!("no reader handles extension '{extension}'")))?;
        let content = std::fs::read_to_string(path)
            .map_err(|_| Error::NoFile(path.display().to_string()))?;
        let problem = reader.read(&content)?;
        self.orig = Some(problem);
        self.status = SolveStatus::Unknown;
        self.stage.advance(Stage::Problem);
        Ok(())
    }

    /// Writes the original problem, choosing the writer by file extension.
    pub fn write_orig_problem(&mut self, path: &Path) -> GourdResult<()> {
        self.stage.require(
            "write_orig_problem",
            &[
                Stage::Problem,
                Stage::Transformed,
                Stage::Presolving,
                Stage::Presolved,
                Stage::Solving,
                Stage::Solved,
            ],
        )?;
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        let reader = self
            .readers
            .iter()
            .find(|reader| reader.extension() == extension)
            .ok_or_else(|| Error::WriteError(format!("no writer handles extension '{extension}'")))?;
        let orig = self.orig.as_ref().ok_or(Error::NoProblem)?;
        let rendered = reader.write(orig)?;
        std::fs::write(path, rendered).map_err(|error| Error::WriteError(error.to_string()))
    }

    /// Adds a variable to the original problem.
    pub fn create_var(
        &mut self,
        name: &str,
        lb: f64,
        ub: f64,
        obj: f64,
        var_type: VarType,
    ) -> GourdResult<VarId> {
        self.stage.require("create_var", &[Stage::Problem])?;
        if lb.is_nan() || ub.is_nan() || obj.is_nan() {
            return Err(Error::InvalidData(format!("variable '{name}' has NaN data")));
        }
        if lb > ub {
            return Err(Error::InvalidData(format!(
                "variable '{name}' has crossing bounds [{lb}, {ub}]"
            )));
        }
        let orig = self.orig.as_mut().ok_or(Error::NoProblem)?;
        if orig.find_var(name).is_some() {
            return Err(Error::KeyAlreadyExisting(name.to_owned()));
        }
        Ok(orig.add_var(Variable::new(name, lb, ub, obj, var_type)))
    }

    /// Adds a constraint. In the problem stage it lands in the original problem; later it is
    /// added to the transformed problem directly (and triggers repropagation when global).
    pub fn add_cons(&mut self, cons: Cons) -> GourdResult<ConsId> {
        self.stage.require(
            "add_cons",
            &[Stage::Problem, Stage::Transformed, Stage::Presolving, Stage::Solving],
        )?;
        if self.stage.stage() == Stage::Problem {
            if self.conshdlrs.find(&cons.hdlr).is_none() {
                return Err(Error::PluginNotFound(cons.hdlr.clone()));
            }
            let orig = self.orig.as_mut().ok_or(Error::NoProblem)?;
            orig.add_cons(cons)
        } else {
            self.add_trans_cons(cons)
        }
    }

    /// Adds a constraint to the transformed problem, registering its locks.
    pub(crate) fn add_trans_cons(&mut self, cons: Cons) -> GourdResult<ConsId> {
        let hdlr = self
            .conshdlrs
            .find(&cons.hdlr)
            .ok_or_else(|| Error::PluginNotFound(cons.hdlr.clone()))?;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        let global = !cons.flags.local;
        hdlr.lock(cons.data.as_ref(), &mut trans.vars, 1, 0);
        let id = trans.add_cons(cons)?;
        if global && self.stage.stage() == Stage::Solving {
            let root = self.tree.root();
            self.tree.mark_reprop(root);
        }
        Ok(id)
    }

    /// Convenience: adds a linear constraint `lhs <= a'x <= rhs`.
    pub fn add_linear_cons(
        &mut self,
        name: &str,
        terms: &[(VarId, f64)],
        lhs: f64,
        rhs: f64,
    ) -> GourdResult<ConsId> {
        let data = builtin::LinearConsData {
            terms: terms.to_vec(),
            lhs,
            rhs,
        };
        self.add_cons(Cons::new(name, builtin::linear::NAME, ConsFlags::default(), Box::new(data)))
    }

    pub fn set_obj_sense(&mut self, sense: ObjSense) -> GourdResult<()> {
        self.stage.require("set_obj_sense", &[Stage::Problem])?;
        self.orig.as_mut().ok_or(Error::NoProblem)?.objsense = sense;
        Ok(())
    }

    pub fn chg_var_lb(&mut self, var: VarId, lb: f64) -> GourdResult<()> {
        self.stage.require("chg_var_lb", &[Stage::Problem])?;
        let tol = self.tol;
        let orig = self.orig.as_mut().ok_or(Error::NoProblem)?;
        let v = &mut orig.vars[var];
        let lb = v.adjusted_lb(&tol, lb);
        if lb > v.ub_global {
            return Err(Error::InvalidData(format!(
                "new lower bound {lb} crosses the upper bound of {}",
                v.name
            )));
        }
        v.lb_global = lb;
        v.lb_local = lb;
        Ok(())
    }

    pub fn chg_var_ub(&mut self, var: VarId, ub: f64) -> GourdResult<()> {
        self.stage.require("chg_var_ub", &[Stage::Problem])?;
        let tol = self.tol;
        let orig = self.orig.as_mut().ok_or(Error::NoProblem)?;
        let v = &mut orig.vars[var];
        let ub = v.adjusted_ub(&tol, ub);
        if ub < v.lb_global {
            return Err(Error::InvalidData(format!(
                "new upper bound {ub} crosses the lower bound of {}",
                v.name
            )));
        }
        v.ub_global = ub;
        v.ub_local = ub;
        Ok(())
    }

    /// Tightens a global bound of a transformed variable.
    pub fn chg_var_lb_global(&mut self, var: VarId, lb: f64) -> GourdResult<()> {
        self.stage
            .require("chg_var_lb_global", &[Stage::Transformed, Stage::Presolving])?;
        let tol = self.tol;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        let v = &mut trans.vars[var];
        let lb = v.adjusted_lb(&tol, lb);
        if lb <= v.lb_global {
            return Ok(());
        }
        let old = v.lb_global;
        v.lb_global = lb;
        v.lb_local = v.lb_local.max(lb);
        self.emit_event(&Event::Var {
            event: EventType::GlbChanged,
            var,
            old,
            new: lb,
        })
    }

    pub fn chg_var_ub_global(&mut self, var: VarId, ub: f64) -> GourdResult<()> {
        self.stage
            .require("chg_var_ub_global", &[Stage::Transformed, Stage::Presolving])?;
        let tol = self.tol;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        let v = &mut trans.vars[var];
        let ub = v.adjusted_ub(&tol, ub);
        if ub >= v.ub_global {
            return Ok(());
        }
        let old = v.ub_global;
        v.ub_global = ub;
        v.ub_local = v.ub_local.min(ub);
        self.emit_event(&Event::Var {
            event: EventType::GubChanged,
            var,
            old,
            new: ub,
        })
    }

    /// Tightens the local lower bound of a transformed variable as a branching-like change.
    pub fn tighten_var_lb(&mut self, var: VarId, value: f64) -> GourdResult<TightenOutcome> {
        self.stage.require(
            "tighten_var_lb",
            &[Stage::Transformed, Stage::Presolving, Stage::Solving],
        )?;
        let tol = self.tol;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        let old = trans.vars[var].lb_local;
        let outcome =
            self.domain
                .tighten_lb_local(&mut trans.vars, &tol, var, value, BoundReason::Branching);
        if outcome == TightenOutcome::Tightened {
            let new = trans.vars[var].lb_local;
            self.emit_event(&Event::Var {
                event: EventType::LbTightened,
                var,
                old,
                new,
            })?;
        }
        Ok(outcome)
    }

    pub fn tighten_var_ub(&mut self, var: VarId, value: f64) -> GourdResult<TightenOutcome> {
        self.stage.require(
            "tighten_var_ub",
            &[Stage::Transformed, Stage::Presolving, Stage::Solving],
        )?;
        let tol = self.tol;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        let old = trans.vars[var].ub_local;
        let outcome =
            self.domain
                .tighten_ub_local(&mut trans.vars, &tol, var, value, BoundReason::Branching);
        if outcome == TightenOutcome::Tightened {
            let new = trans.vars[var].ub_local;
            self.emit_event(&Event::Var {
                event: EventType::UbTightened,
                var,
                old,
                new,
            })?;
        }
        Ok(outcome)
    }

    pub fn chg_var_obj(&mut self, var: VarId, obj: f64) -> GourdResult<()> {
        self.stage.require("chg_var_obj", &[Stage::Problem])?;
        let orig = self.orig.as_mut().ok_or(Error::NoProblem)?;
        let old = orig.vars[var].obj;
        orig.vars[var].obj = obj;
        self.emit_event(&Event::Var {
            event: EventType::ObjChanged,
            var,
            old,
            new: obj,
        })
    }

    /// Fixes a transformed variable globally.
    pub fn fix_var(&mut self, var: VarId, value: f64) -> GourdResult<()> {
        self.stage
            .require("fix_var", &[Stage::Transformed, Stage::Presolving])?;
        let tol = self.tol;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        let v = &trans.vars[var];
        if !tol.is_feas_ge(value, v.lb_global) || !tol.is_feas_le(value, v.ub_global) {
            return Err(Error::InvalidData(format!(
                "fixing value {value} is outside the bounds of {}",
                v.name
            )));
        }
        let old = v.lb_local;
        trans.fix_var(var, value);
        let v = &mut trans.vars[var];
        v.lb_global = value;
        v.ub_global = value;
        v.lb_local = value;
        v.ub_local = value;
        self.emit_event(&Event::Var {
            event: EventType::VarFixed,
            var,
            old,
            new: value,
        })
    }

    /// Replaces `var` by `scalar * other + constant` everywhere.
    pub fn aggregate_vars(
        &mut self,
        var: VarId,
        other: VarId,
        scalar: f64,
        constant: f64,
    ) -> GourdResult<()> {
        self.stage.require("aggregate_vars", &[Stage::Presolving])?;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        trans.aggregate_var(var, other, scalar, constant)
    }

    /// The local lower bound of a transformed variable.
    pub fn var_lb_local(&self, var: VarId) -> GourdResult<f64> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        Ok(trans.vars[var].lb_local)
    }

    /// The local upper bound of a transformed variable.
    pub fn var_ub_local(&self, var: VarId) -> GourdResult<f64> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        Ok(trans.vars[var].ub_local)
    }

    /// Replaces `var` by an affine combination of several variables.
    pub fn multiaggregate_var(
        &mut self,
        var: VarId,
        vars: Vec<(VarId, f64)>,
        constant: f64,
    ) -> GourdResult<()> {
        self.stage.require("multiaggregate_var", &[Stage::Presolving])?;
        let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
        trans.multiaggregate_var(var, vars, constant)
    }

    // ------------------------------------------------------------------
    // Lifecycle: transform, presolve, solve, free.
    // ------------------------------------------------------------------

    /// Builds the transformed working copy of the problem. Idempotent once transformed.
    ///
    /// The transformed problem is always a minimization; a maximization objective is negated
    /// here and mapped back when solutions are retransformed. Transformed variables share
    /// their index with their original twin.
    pub fn transform(&mut self) -> GourdResult<()> {
        self.stage.require("transform", &[Stage::Problem, Stage::Transformed])?;
        if self.stage.stage() == Stage::Transformed {
            return Ok(());
        }
        self.stage.advance(Stage::Transforming);
        let orig = self.orig.as_mut().ok_or(Error::NoProblem)?;
        let maximize = orig.objsense == ObjSense::Maximize;
        let mut trans = Problem::new(&format!("t_{}", orig.name), true);
        trans.obj_offset = if maximize { -orig.obj_offset } else { orig.obj_offset };

        let var_ids: Vec<VarId> = orig.vars.keys().collect();
        for id in var_ids {
            let twin = {
                let source = &orig.vars[id];
                let obj = if maximize { -source.obj } else { source.obj };
                let mut twin = Variable::new(
                    &format!("t_{}", source.name),
                    source.lb_global,
                    source.ub_global,
                    obj,
                    source.var_type,
                );
                twin.status = VarStatus::Loose;
                twin.orig_var = Some(id);
                twin.branch_priority = source.branch_priority;
                twin.branch_factor = source.branch_factor;
                twin.branch_direction = source.branch_direction;
                twin
            };
            let tid = trans.add_var(twin);
            orig.vars[id].transformed_twin = Some(tid);
        }

        let cons_ids: Vec<ConsId> = orig.conss.keys().collect();
        for id in cons_ids {
            let cons = &orig.conss[id];
            if cons.deleted {
                continue;
            }
            let hdlr = self
                .conshdlrs
                .find(&cons.hdlr)
                .ok_or_else(|| Error::PluginNotFound(cons.hdlr.clone()))?;
            let data = hdlr.trans(cons.data.as_ref());
            hdlr.lock(data.as_ref(), &mut trans.vars, 1, 0);
            let twin = Cons::new(&format!("t_{}", cons.name), &cons.hdlr, cons.flags, data);
            let _ = trans.add_cons(twin)?;
        }

        self.trans = Some(trans);
        self.stage.advance(Stage::Transformed);
        Ok(())
    }

    /// Runs the presolving rounds. Transforms first when necessary.
    pub fn presolve(&mut self) -> GourdResult<()> {
        self.stage
            .require("presolve", &[Stage::Problem, Stage::Transformed, Stage::Presolving])?;
        if self.stage.stage() == Stage::Problem {
            self.transform()?;
        }
        if self.stage.stage() == Stage::Transformed {
            self.stage.advance(Stage::InitPresolve);
            self.stage.advance(Stage::Presolving);
        }
        self.presolve_rounds()
    }

    fn presolve_rounds(&mut self) -> GourdResult<()> {
        let maxrounds = self.params.get_int("presolving/maxrounds")?;
        let mut round: u32 = 0;
        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                self.status = SolveStatus::UserInterrupt;
                break;
            }
            if maxrounds >= 0 && round >= maxrounds as u32 {
                break;
            }
            let mut reduced = false;
            let mut outcome = SolveStatus::Unknown;
            {
                let Solver {
                    tol,
                    trans,
                    domain,
                    lp,
                    primal,
                    presolvers,
                    conshdlrs,
                    ..
                } = self;
                let trans = trans.as_mut().ok_or(Error::NoProblem)?;

                for presolver in presolvers.iter_mut() {
                    let cap = presolver.maxrounds();
                    if cap >= 0 && round >= cap as u32 {
                        continue;
                    }
                    let mut ctx = PluginCtx {
                        tol: &*tol,
                        trans: &mut *trans,
                        domain: &mut *domain,
                        lp: &mut *lp,
                        primal: &*primal,
                        depth: 0,
                    };
                    match presolver.exec(&mut ctx, round)? {
                        PresolResult::Reduced => reduced = true,
                        PresolResult::Cutoff => outcome = SolveStatus::Infeasible,
                        PresolResult::Unbounded => outcome = SolveStatus::Unbounded,
                        PresolResult::DidNotRun | PresolResult::DidNotFind => {}
                    }
                    if outcome != SolveStatus::Unknown {
                        break;
                    }
                }

                if outcome == SolveStatus::Unknown {
                    let by_hdlr = conss_by_hdlr(trans, |cons| cons.active && !cons.deleted);
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
                            depth: 0,
                        };
                        match hdlr.presolve(&mut ctx, conss)? {
                            PresolResult::Reduced => reduced = true,
                            PresolResult::Cutoff => outcome = SolveStatus::Infeasible,
                            PresolResult::Unbounded => outcome = SolveStatus::Unbounded,
                            PresolResult::DidNotRun | PresolResult::DidNotFind => {}
                        }
                        if outcome != SolveStatus::Unknown {
                            break;
                        }
                    }
                }
            }
            if outcome != SolveStatus::Unknown {
                self.status = outcome;
                break;
            }
            if !reduced {
                break;
            }
            round += 1;
        }
        Ok(())
    }

    /// Solves the problem: transforms and presolves when necessary, then runs the
    /// branch-and-bound loop until optimality, infeasibility, or a limit.
    pub fn solve(&mut self) -> GourdResult<()> {
        self.stage.require(
            "solve",
            &[Stage::Problem, Stage::Transformed, Stage::Presolving, Stage::Presolved],
        )?;
        if matches!(self.stage.stage(), Stage::Problem | Stage::Transformed) {
            self.presolve()?;
        }
        if self.stage.stage() == Stage::Presolving {
            let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
            trans.compress_deleted();
            self.stage.advance(Stage::ExitPresolve);
            self.stage.advance(Stage::Presolved);
        }
        self.stage.advance(Stage::InitSolve);
        self.init_solve()?;
        self.stage.advance(Stage::Solving);
        if matches!(
            self.status,
            SolveStatus::Infeasible | SolveStatus::Unbounded | SolveStatus::UserInterrupt
        ) {
            self.stage.advance(Stage::Solved);
            return Ok(());
        }
        self.solving_loop()?;
        self.stage.advance(Stage::Solved);
        self.log_end_statistics();
        Ok(())
    }

    fn init_solve(&mut self) -> GourdResult<()> {
        self.limits = Limits::from_params(&self.params)?;
        self.primal.maxsols = self.params.get_int("limits/maxsol")? as usize;
        self.sepastore.minefficacy = self.params.get_real("separating/minefficacy")?;
        self.cutpool.agelimit = self.params.get_real("separating/cutagelimit")?;
        self.solve_start = Some(Instant::now());
        self.nodes_since_best = 0;
        self.display_rows = 0;
        let objective_limit = self.params.get_real("limits/objective")?;
        let maximize = self
            .orig
            .as_ref()
            .is_some_and(|orig| orig.objsense == ObjSense::Maximize);
        self.obj_limit = if self.tol.is_infinity(objective_limit.abs()) {
            f64::INFINITY
        } else if maximize {
            -objective_limit
        } else {
            objective_limit
        };
        let tol = self.tol;
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        self.obj_integral = tol.is_integral(trans.obj_offset)
            && trans.active_var_ids().iter().all(|&id| {
                let var = &trans.vars[id];
                var.obj == 0.0 || (var.var_type.is_discrete() && tol.is_integral(var.obj))
            });
        self.update_cutoff_bound();
        Ok(())
    }

    /// Frees the search state. With `restart` the transformed problem survives with
    /// globalized root bounds and the solver returns to the transformed stage, ready for
    /// another [`Solver::solve`]; otherwise everything transformed is freed.
    pub fn free_solve(&mut self, restart: bool) -> GourdResult<()> {
        self.stage.require("free_solve", &[Stage::Solving, Stage::Solved])?;
        if self.in_probing() || self.lp.in_dive() || self.lp.in_strongbranch() {
            return Err(Error::InvalidCall {
                operation: "free_solve",
                stage: self.stage.stage(),
            });
        }
        self.stage.advance(Stage::ExitSolve);
        self.teardown_search();
        self.stage.advance(Stage::FreeTrans);
        if restart {
            let trans = self.trans.as_mut().ok_or(Error::NoProblem)?;
            for var in trans.vars.iter_mut() {
                if var.status.is_active() {
                    var.lb_global = var.lb_global.max(var.lb_local);
                    var.ub_global = var.ub_global.min(var.ub_local);
                    var.lb_local = var.lb_global;
                    var.ub_local = var.ub_global;
                }
            }
            self.primal.keep_best_only();
            self.stage.advance(Stage::Transformed);
            self.n_restarts += 1;
            self.status = SolveStatus::Unknown;
        } else {
            self.drop_transformed()?;
            self.stage.advance(Stage::Problem);
            self.status = SolveStatus::Unknown;
        }
        Ok(())
    }

    /// Frees the transformed problem and returns to the problem stage. Pool solutions are
    /// retransformed into original space first.
    pub fn free_transform(&mut self) -> GourdResult<()> {
        self.stage.require(
            "free_transform",
            &[Stage::Transformed, Stage::Presolving, Stage::Presolved, Stage::Solved],
        )?;
        loop {
            match self.stage.stage() {
                Stage::Transformed => self.stage.advance(Stage::InitPresolve),
                Stage::InitPresolve => self.stage.advance(Stage::Presolving),
                Stage::Presolving => self.stage.advance(Stage::ExitPresolve),
                Stage::ExitPresolve => self.stage.advance(Stage::Presolved),
                Stage::Presolved => self.stage.advance(Stage::InitSolve),
                Stage::InitSolve => self.stage.advance(Stage::Solving),
                Stage::Solving | Stage::Solved => {
                    self.stage.advance(Stage::ExitSolve);
                    break;
                }
                _ => break,
            }
        }
        self.teardown_search();
        self.stage.advance(Stage::FreeTrans);
        self.drop_transformed()?;
        self.stage.advance(Stage::Problem);
        self.status = SolveStatus::Unknown;
        Ok(())
    }

    fn teardown_search(&mut self) {
        if let Some(trans) = self.trans.as_mut() {
            if self.domain.current_frame() > 0 {
                self.domain.backtrack_to(0, &mut trans.vars);
            }
            for var in trans.vars.iter_mut() {
                if var.status == VarStatus::Column {
                    var.status = VarStatus::Loose;
                }
            }
        }
        self.domain = DomainState::default();
        self.lp.clear();
        self.tree = Tree::default();
        self.cutpool.clear();
        self.sepastore.clear_cuts();
        self.branch_records.clear();
        self.probing_base = None;
        self.n_permanent_rows = 0;
        self.has_local_rows = false;
        self.solve_start = None;
    }

    fn drop_transformed(&mut self) -> GourdResult<()> {
        let tol = self.tol;
        if let (Some(orig), Some(trans)) = (self.orig.as_ref(), self.trans.as_ref()) {
            let retransformed: Vec<Solution> = self
                .primal
                .sols()
                .iter()
                .map(|sol| {
                    if sol.transformed {
                        sol.retransform(orig, trans)
                    } else {
                        sol.clone()
                    }
                })
                .collect();
            let n_found = self.primal.n_found;
            let n_improvements = self.primal.n_improvements;
            self.primal.clear();
            for sol in retransformed {
                let _ = self.primal.add_sol(sol, &tol);
            }
            self.primal.n_found = n_found;
            self.primal.n_improvements = n_improvements;
        }
        if let Some(trans) = self.trans.as_mut() {
            let Problem { conss, vars, .. } = trans;
            let cons_ids: Vec<ConsId> = conss.keys().collect();
            for id in cons_ids {
                let cons = &conss[id];
                if cons.deleted {
                    continue;
                }
                if let Some(hdlr) = self.conshdlrs.find(&cons.hdlr) {
                    hdlr.lock(cons.data.as_ref(), vars, -1, 0);
                }
            }
        }
        if let Some(orig) = self.orig.as_mut() {
            for var in orig.vars.iter_mut() {
                var.transformed_twin = None;
            }
        }
        self.trans = None;
        self.conflict = ConflictAnalysis::default();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Solutions.
    // ------------------------------------------------------------------

    /// An empty solution in transformed space.
    pub fn create_sol(&self) -> GourdResult<Solution> {
        self.stage.require(
            "create_sol",
            &[Stage::Transformed, Stage::Presolving, Stage::Presolved, Stage::Solving],
        )?;
        Ok(Solution::new(SolOrigin::User, true))
    }

    /// An empty solution in original space.
    pub fn create_orig_sol(&self) -> GourdResult<Solution> {
        self.stage.require(
            "create_orig_sol",
            &[
                Stage::Problem,
                Stage::Transformed,
                Stage::Presolving,
                Stage::Presolved,
                Stage::Solving,
                Stage::Solved,
            ],
        )?;
        Ok(Solution::new(SolOrigin::User, false))
    }

    /// The current LP solution as a primal candidate.
    pub fn create_lp_sol(&self) -> GourdResult<Solution> {
        self.stage.require("create_lp_sol", &[Stage::Solving])?;
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        let mut sol = Solution::new(SolOrigin::Lp, true);
        sol.depth = self.tree.node(self.tree.focus()).depth;
        for id in trans.active_var_ids() {
            let value = match self.lp.col_of(id) {
                Some(col) => self.lp.col_primal(col),
                None => pseudo_value(&trans.vars[id]),
            };
            sol.set_val(id, value);
        }
        let _ = sol.recompute_obj(trans);
        Ok(sol)
    }

    /// The pseudo solution: every variable at its objective-best local bound.
    pub fn create_pseudo_sol(&self) -> GourdResult<Solution> {
        self.stage.require(
            "create_pseudo_sol",
            &[Stage::Transformed, Stage::Presolving, Stage::Solving],
        )?;
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        let mut sol = Solution::new(SolOrigin::Pseudo, true);
        for id in trans.active_var_ids() {
            sol.set_val(id, pseudo_value(&trans.vars[id]));
        }
        let _ = sol.recompute_obj(trans);
        Ok(sol)
    }

    /// A transformed-space solution with every active variable marked unknown.
    pub fn create_unknown_sol(&self) -> GourdResult<Solution> {
        self.stage.require(
            "create_unknown_sol",
            &[Stage::Transformed, Stage::Presolving, Stage::Solving],
        )?;
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        let mut sol = Solution::new(SolOrigin::User, true);
        for id in trans.active_var_ids() {
            sol.mark_unknown(id);
        }
        Ok(sol)
    }

    /// Offers a candidate solution to the pool: rounds it, checks it, and stores it when
    /// feasible. Returns whether the pool accepted it.
    pub fn try_sol(&mut self, sol: Solution) -> GourdResult<bool> {
        self.stage.require(
            "try_sol",
            &[Stage::Transformed, Stage::Presolving, Stage::Presolved, Stage::Solving, Stage::Solved],
        )?;
        let tol = self.tol;
        let mut sol = if sol.transformed {
            sol
        } else {
            // Original-space candidate: map it onto the transformed twins (shared indices).
            let orig = self.orig.as_ref().ok_or(Error::NoProblem)?;
            let mut mapped = Solution::new(sol.origin.clone(), true);
            mapped.depth = sol.depth;
            for var in orig.vars.keys() {
                if let Some(twin) = orig.vars[var].transformed_twin {
                    if sol.is_unknown(var) {
                        mapped.mark_unknown(twin);
                    } else {
                        mapped.set_val(twin, sol.raw_val(var));
                    }
                }
            }
            mapped
        };
        if sol.has_unknowns() {
            return Ok(false);
        }
        {
            let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
            if sol.round(trans, &tol).is_err() {
                return Ok(false);
            }
            let _ = sol.recompute_obj(trans);
        }
        if !self.check_sol_internal(&sol)? {
            return Ok(false);
        }
        // Solutions at or above the user objective limit do not count.
        if self.tol.is_ge(sol.obj, self.obj_limit) {
            return Ok(false);
        }
        let obj = sol.obj;
        let before = self.primal.n_sols();
        let improved = self.primal.add_sol(sol, &tol);
        let stored = improved || self.primal.n_sols() > before;
        self.emit_event(&Event::Sol {
            event: if improved {
                EventType::BestSolFound
            } else {
                EventType::PoorSolFound
            },
            obj,
        })?;
        if improved {
            self.nodes_since_best = 0;
            self.update_cutoff_bound();
        }
        Ok(stored)
    }

    /// Checks a transformed-space solution against bounds, integrality, and all
    /// check-flagged constraints.
    pub fn check_sol(&self, sol: &Solution) -> GourdResult<bool> {
        self.stage.require(
            "check_sol",
            &[Stage::Transformed, Stage::Presolving, Stage::Presolved, Stage::Solving, Stage::Solved],
        )?;
        self.check_sol_internal(sol)
    }

    fn check_sol_internal(&self, sol: &Solution) -> GourdResult<bool> {
        let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
        let tol = &self.tol;
        for id in trans.active_var_ids() {
            let var = &trans.vars[id];
            let value = sol.raw_val(id);
            if !tol.is_feas_ge(value, var.lb_global) || !tol.is_feas_le(value, var.ub_global) {
                return Ok(false);
            }
            if var.var_type.is_discrete() && !tol.is_integral(value) {
                return Ok(false);
            }
        }
        let by_hdlr = conss_by_hdlr(trans, |cons| cons.flags.check && cons.active && !cons.deleted);
        let order: Vec<String> = self
            .conshdlrs
            .iter()
            .map(|hdlr| (hdlr.name().to_owned(), hdlr.check_priority()))
            .sorted_by_key(|&(_, priority)| std::cmp::Reverse(priority))
            .map(|(name, _)| name)
            .collect();
        for name in order {
            let Some(conss) = by_hdlr.get(&name) else { continue };
            let hdlr = self
                .conshdlrs
                .find(&name)
                .ok_or_else(|| Error::PluginNotFound(name.clone()))?;
            for &id in conss {
                if hdlr.check(trans, tol, &trans.conss[id], sol) == CheckResult::Infeasible {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Checks an original-space solution against the original problem.
    pub fn check_sol_orig(&self, sol: &Solution) -> GourdResult<bool> {
        self.stage.require(
            "check_sol_orig",
            &[
                Stage::Problem,
                Stage::Transformed,
                Stage::Presolving,
                Stage::Presolved,
                Stage::Solving,
                Stage::Solved,
            ],
        )?;
        let orig = self.orig.as_ref().ok_or(Error::NoProblem)?;
        let tol = &self.tol;
        for id in orig.vars.keys() {
            let var = &orig.vars[id];
            if var.deleted {
                continue;
            }
            let value = sol.raw_val(id);
            if !tol.is_feas_ge(value, var.lb_global) || !tol.is_feas_le(value, var.ub_global) {
                return Ok(false);
            }
            if var.var_type.is_discrete() && !tol.is_integral(value) {
                return Ok(false);
            }
        }
        for id in orig.active_cons_ids() {
            let cons = &orig.conss[id];
            if !cons.flags.check {
                continue;
            }
            let hdlr = self
                .conshdlrs
                .find(&cons.hdlr)
                .ok_or_else(|| Error::PluginNotFound(cons.hdlr.clone()))?;
            if hdlr.check(orig, tol, cons, sol) == CheckResult::Infeasible {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn n_sols(&self) -> usize {
        self.primal.n_sols()
    }

    pub fn sols(&self) -> &[Solution] {
        self.primal.sols()
    }

    pub fn best_sol(&self) -> Option<&Solution> {
        self.primal.best_sol()
    }

    /// The objective value of a solution in the original problem's sense.
    pub fn sol_orig_obj(&self, sol: &Solution) -> f64 {
        if !sol.transformed {
            return sol.obj;
        }
        match (self.orig.as_ref(), self.trans.as_ref()) {
            (Some(orig), Some(trans)) => sol.retransform(orig, trans).obj,
            _ => sol.obj,
        }
    }

    /// The objective value of a solution in the transformed (minimization) sense.
    pub fn sol_trans_obj(&self, sol: &Solution) -> f64 {
        sol.obj
    }

    /// The value of a variable in a solution, following aggregations.
    pub fn sol_val(&self, sol: &Solution, var: VarId) -> f64 {
        let problem = if sol.transformed {
            self.trans.as_ref()
        } else {
            self.orig.as_ref()
        };
        match problem {
            Some(problem) => sol.val(problem, var),
            None => sol.raw_val(var),
        }
    }

    /// Rounds the discrete variables of a solution to integral values where the rounding
    /// locks allow it.
    pub fn round_sol(&self, sol: &mut Solution) -> GourdResult<()> {
        let problem = if sol.transformed {
            self.trans.as_ref()
        } else {
            self.orig.as_ref()
        };
        let problem = problem.ok_or(Error::NoProblem)?;
        sol.round(problem, &self.tol)
    }

    pub fn has_primal_ray(&self) -> bool {
        self.primal.has_ray()
    }

    /// The value of a variable in the stored unbounded ray. Twin indices coincide, so the
    /// id of an original variable addresses its transformed column as well.
    pub fn primal_ray_val(&self, var: VarId) -> f64 {
        self.primal.ray_val(var)
    }

    /// Writes the best solution in original space to a file.
    pub fn write_best_sol(&self, path: &Path) -> GourdResult<()> {
        let best = self
            .primal
            .best_sol()
            .ok_or_else(|| Error::InvalidData("no solution to write".to_owned()))?;
        let orig = self.orig.as_ref().ok_or(Error::NoProblem)?;
        let rendered = if best.transformed {
            let trans = self.trans.as_ref().ok_or(Error::NoProblem)?;
            io::sol::write(orig, &best.retransform(orig, trans))
        } else {
            io::sol::write(orig, best)
        };
        std::fs::write(path, rendered).map_err(|error| Error::WriteError(error.to_string()))
    }

    /// Strengthens the cutoff bound from the incumbent and the user objective limit, and
    /// prunes the open list.
    pub(crate) fn update_cutoff_bound(&mut self) {
        let ub = self.primal.upper_bound();
        let bound = if self.obj_integral && ub.is_finite() {
            ub - 1.0 + self.tol.feastol
        } else {
            ub
        };
        self.tree.cutoff_bound = bound.min(self.obj_limit);
        let tol = self.tol;
        let _ = self.tree.prune_open(&tol);
    }

    // ------------------------------------------------------------------
    // Events.
    // ------------------------------------------------------------------

    pub(crate) fn emit_event(&mut self, event: &Event) -> GourdResult<()> {
        let handlers = self.filter.matching_handlers(event);
        for name in handlers {
            if let Some(hdlr) = self.eventhdlrs.find_mut(&name) {
                hdlr.exec(event)?;
            }
        }
        Ok(())
    }

    /// Routes all events in the mask to the named event handler.
    pub fn catch_event(&mut self, mask: EnumSet<EventType>, handler: &str) -> GourdResult<FilterPos> {
        if self.eventhdlrs.find(handler).is_none() {
            return Err(Error::PluginNotFound(handler.to_owned()));
        }
        Ok(self.filter.catch(mask, handler))
    }

    /// Routes events of one variable to the named event handler.
    pub fn catch_var_event(
        &mut self,
        var: VarId,
        mask: EnumSet<EventType>,
        handler: &str,
    ) -> GourdResult<FilterPos> {
        if self.eventhdlrs.find(handler).is_none() {
            return Err(Error::PluginNotFound(handler.to_owned()));
        }
        self.filter.catch_var(var, mask, handler)
    }

    /// Routes events of one row to the named event handler.
    pub fn catch_row_event(
        &mut self,
        row: RowId,
        mask: EnumSet<EventType>,
        handler: &str,
    ) -> GourdResult<FilterPos> {
        if self.eventhdlrs.find(handler).is_none() {
            return Err(Error::PluginNotFound(handler.to_owned()));
        }
        self.filter.catch_row(row, mask, handler)
    }

    pub fn drop_event(&mut self, pos: FilterPos) -> GourdResult<()> {
        self.filter.drop_filter(pos)
    }

    // ------------------------------------------------------------------
    // Parameters.
    // ------------------------------------------------------------------

    pub fn read_params(&mut self, path: &Path) -> GourdResult<()> {
        self.params.read_file(path)
    }

    pub fn write_params(&self, path: &Path, only_changed: bool, with_comments: bool) -> GourdResult<()> {
        self.params.write_file(path, only_changed, with_comments)
    }

    pub fn set_emphasis(&mut self, emphasis: Emphasis) {
        self.params.set_emphasis(emphasis);
    }
}

/// The objective-best value inside the local bounds, used when no LP value exists.
pub(crate) fn pseudo_value(var: &Variable) -> f64 {
    if var.obj >= 0.0 && var.lb_local.is_finite() {
        var.lb_local
    } else if var.obj < 0.0 && var.ub_local.is_finite() {
        var.ub_local
    } else if var.lb_local.is_finite() {
        var.lb_local
    } else if var.ub_local.is_finite() {
        var.ub_local
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem_with_two_vars() -> Solver {
        let mut solver = Solver::default();
        solver.create_prob("two").unwrap();
        let x = solver
            .create_var("x", 0.0, 10.0, 1.0, VarType::Integer)
            .unwrap();
        let y = solver
            .create_var("y", 0.0, 10.0, 2.0, VarType::Integer)
            .unwrap();
        solver
            .add_linear_cons("c", &[(x, 1.0), (y, 1.0)], 3.0, f64::INFINITY)
            .unwrap();
        solver
    }

    #[test]
    fn operations_respect_the_stage_machine() {
        let mut solver = Solver::default();
        let result = solver.create_var("x", 0.0, 1.0, 1.0, VarType::Continuous);
        assert!(matches!(
            result,
            Err(Error::InvalidCall {
                operation: "create_var",
                ..
            })
        ));
        assert_eq!(Stage::Init, solver.stage());

        solver.create_prob("p").unwrap();
        assert!(matches!(solver.create_prob("q"), Err(Error::InvalidCall { .. })));
        assert_eq!(Stage::Problem, solver.stage());
    }

    #[test]
    fn duplicate_variable_names_are_rejected() {
        let mut solver = Solver::default();
        solver.create_prob("p").unwrap();
        let _ = solver.create_var("x", 0.0, 1.0, 0.0, VarType::Binary).unwrap();
        assert!(matches!(
            solver.create_var("x", 0.0, 1.0, 0.0, VarType::Binary),
            Err(Error::KeyAlreadyExisting(_))
        ));
    }

    #[test]
    fn crossing_bounds_are_rejected() {
        let mut solver = Solver::default();
        solver.create_prob("p").unwrap();
        assert!(matches!(
            solver.create_var("x", 2.0, 1.0, 0.0, VarType::Continuous),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn transform_is_idempotent() {
        let mut solver = problem_with_two_vars();
        solver.transform().unwrap();
        assert_eq!(Stage::Transformed, solver.stage());
        let n_vars = solver.trans.as_ref().unwrap().n_vars();
        solver.transform().unwrap();
        assert_eq!(n_vars, solver.trans.as_ref().unwrap().n_vars());
    }

    #[test]
    fn transform_negates_a_maximization_objective() {
        let mut solver = Solver::default();
        solver.create_prob("max").unwrap();
        let x = solver
            .create_var("x", 0.0, 1.0, 3.0, VarType::Continuous)
            .unwrap();
        solver.set_obj_sense(ObjSense::Maximize).unwrap();
        solver.transform().unwrap();
        let trans = solver.trans.as_ref().unwrap();
        assert_eq!(-3.0, trans.vars[x].obj);
        assert_eq!(ObjSense::Minimize, trans.objsense);
    }

    #[test]
    fn transformed_twins_share_indices() {
        let mut solver = problem_with_two_vars();
        solver.transform().unwrap();
        let orig = solver.orig.as_ref().unwrap();
        for id in orig.vars.keys() {
            assert_eq!(Some(id), orig.vars[id].transformed_twin);
        }
    }

    #[test]
    fn adding_a_cons_with_unknown_handler_fails() {
        let mut solver = Solver::default();
        solver.create_prob("p").unwrap();
        let cons = Cons::new(
            "weird",
            "nonexistent",
            ConsFlags::default(),
            Box::new(builtin::LinearConsData {
                terms: Vec::new(),
                lhs: 0.0,
                rhs: 0.0,
            }),
        );
        assert!(matches!(solver.add_cons(cons), Err(Error::PluginNotFound(_))));
    }

    #[test]
    fn plugin_registration_is_rejected_after_transform() {
        let mut solver = problem_with_two_vars();
        solver.transform().unwrap();
        let result = solver.include_presolver(Box::new(builtin::TrivialPresol::default()));
        assert!(matches!(result, Err(Error::InvalidCall { .. })));
    }

    #[test]
    fn free_transform_returns_to_the_problem_stage() {
        let mut solver = problem_with_two_vars();
        solver.transform().unwrap();
        solver.free_transform().unwrap();
        assert_eq!(Stage::Problem, solver.stage());
        assert!(solver.trans.is_none());
        // The problem is still intact and can be transformed again.
        solver.transform().unwrap();
        assert_eq!(Stage::Transformed, solver.stage());
    }

    #[test]
    fn an_interrupt_is_honoured_between_presolving_rounds() {
        let mut solver = problem_with_two_vars();
        solver.interrupt();
        solver.presolve().unwrap();
        assert_eq!(SolveStatus::UserInterrupt, solver.status);

        // A subsequent solve call stops before entering the search.
        solver.solve().unwrap();
        assert_eq!(SolveStatus::UserInterrupt, solver.status());
        assert_eq!(Stage::Solved, solver.stage());
        assert_eq!(0, solver.n_nodes());
    }

    #[test]
    fn freq_hits_encodes_root_only_and_disabled() {
        assert!(freq_hits(0, 0));
        assert!(!freq_hits(0, 3));
        assert!(!freq_hits(-1, 0));
        assert!(freq_hits(2, 4));
        assert!(!freq_hits(2, 5));
        assert!(freq_hits(1, 7));
    }
}
