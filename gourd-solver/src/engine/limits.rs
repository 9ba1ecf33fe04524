//! Solving limits and the periodic checks against them.

use crate::params::ParamSet;
use crate::results::GourdResult;
use crate::results::SolveStatus;

/// The limit values in force during one solve, read once at solve start.
///
/// Negative node/solution counts mean "no limit"; the time limit uses the infinity
/// convention of the numeric layer.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Limits {
    pub nodes: i64,
    pub total_nodes: i64,
    pub stall_nodes: i64,
    pub time: f64,
    pub gap: f64,
    pub solutions: i32,
    pub best_solutions: i32,
}

/// The live counters the limits are checked against.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LimitSnapshot {
    pub n_nodes: u64,
    pub n_total_nodes: u64,
    pub nodes_since_best: u64,
    pub elapsed: f64,
    pub primal_bound: f64,
    pub dual_bound: f64,
    pub n_sols: usize,
    pub n_improvements: u64,
}

impl Default for Limits {
    /// No limit on anything.
    fn default() -> Self {
        Limits {
            nodes: -1,
            total_nodes: -1,
            stall_nodes: -1,
            time: 1e20,
            gap: 0.0,
            solutions: -1,
            best_solutions: -1,
        }
    }
}

impl Limits {
    pub(crate) fn from_params(params: &ParamSet) -> GourdResult<Limits> {
        Ok(Limits {
            nodes: params.get_long("limits/nodes")?,
            total_nodes: params.get_long("limits/totalnodes")?,
            stall_nodes: params.get_long("limits/stallnodes")?,
            time: params.get_real("limits/time")?,
            gap: params.get_real("limits/gap")?,
            solutions: params.get_int("limits/solutions")?,
            best_solutions: params.get_int("limits/bestsol")?,
        })
    }

    /// The first limit the snapshot violates, in a fixed priority order.
    pub(crate) fn check(&self, snapshot: &LimitSnapshot) -> Option<SolveStatus> {
        if self.time < 1e20 && snapshot.elapsed >= self.time {
            return Some(SolveStatus::TimeLimit);
        }
        if self.nodes >= 0 && snapshot.n_nodes >= self.nodes as u64 {
            return Some(SolveStatus::NodeLimit);
        }
        if self.total_nodes >= 0 && snapshot.n_total_nodes >= self.total_nodes as u64 {
            return Some(SolveStatus::TotalNodeLimit);
        }
        if self.stall_nodes >= 0 && snapshot.nodes_since_best >= self.stall_nodes as u64 {
            return Some(SolveStatus::StallNodeLimit);
        }
        if self.gap > 0.0 && gap(snapshot.primal_bound, snapshot.dual_bound) <= self.gap {
            return Some(SolveStatus::GapLimit);
        }
        if self.solutions >= 0 && snapshot.n_sols >= self.solutions as usize {
            return Some(SolveStatus::SolLimit);
        }
        if self.best_solutions >= 0 && snapshot.n_improvements >= self.best_solutions as u64 {
            return Some(SolveStatus::BestSolLimit);
        }
        None
    }
}

/// The relative primal-dual gap: `|primal - dual| / min(|primal|, |dual|)`, infinite when the
/// bounds have opposite signs or either is zero or infinite.
pub(crate) fn gap(primal: f64, dual: f64) -> f64 {
    if !primal.is_finite() || !dual.is_finite() || primal.abs() >= 1e20 || dual.abs() >= 1e20 {
        return f64::INFINITY;
    }
    if primal == 0.0 || dual == 0.0 || primal.signum() != dual.signum() {
        return f64::INFINITY;
    }
    (primal - dual).abs() / primal.abs().min(dual.abs())
}
