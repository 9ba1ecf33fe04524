//! The seam between the driver and the LP oracle.
//!
//! The driver treats the LP solver as a black-box numerical oracle: load a problem snapshot,
//! solve, report status/solution/ray. Warm starting is an internal affair of the backend.

use crate::num::Tolerances;

/// Status of an LP solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LpStatus {
    /// An optimal primal/dual pair was found.
    Optimal,
    /// The LP is primal infeasible.
    Infeasible,
    /// The LP is unbounded; a primal ray is available.
    UnboundedRay,
    /// The iteration limit was hit before convergence.
    IterLimit,
    /// The time limit was hit before convergence.
    TimeLimit,
    /// A numerical error occurred.
    Error,
}

/// The dense snapshot of the active LP handed to the backend.
///
/// Column order matches the column arena of the LP manager, row order the row arena; the
/// backend reports solutions in the same order.
#[derive(Clone, Debug, Default)]
pub struct LpData {
    /// Objective coefficients per column (minimisation).
    pub obj: Vec<f64>,
    /// Column bounds; infinities encode free directions.
    pub col_lb: Vec<f64>,
    pub col_ub: Vec<f64>,
    /// Sparse rows: (column index, coefficient) pairs.
    pub rows: Vec<Vec<(usize, f64)>>,
    /// Row sides; `lhs <= a'x <= rhs`.
    pub row_lhs: Vec<f64>,
    pub row_rhs: Vec<f64>,
    /// Objective constant.
    pub obj_offset: f64,
}

/// The outcome of an LP solve.
#[derive(Clone, Debug)]
pub struct LpResult {
    pub status: LpStatus,
    /// Objective value of the reported primal point (including the offset).
    pub obj_val: f64,
    /// Primal values per column.
    pub primal: Vec<f64>,
    /// Dual values per row (empty if the backend does not provide them).
    pub dual: Vec<f64>,
    /// A primal ray certifying unboundedness (only for [`LpStatus::UnboundedRay`]).
    pub ray: Vec<f64>,
    /// Simplex iterations (or an equivalent effort measure) spent.
    pub iterations: u64,
}

impl LpResult {
    pub fn error() -> LpResult {
        LpResult {
            status: LpStatus::Error,
            obj_val: f64::NAN,
            primal: Vec::new(),
            dual: Vec::new(),
            ray: Vec::new(),
            iterations: 0,
        }
    }
}

/// A black-box LP oracle.
///
/// The bundled [`super::SimplexBackend`] implements this from scratch on every call; a
/// production embedding would wrap an external simplex/barrier code and keep basis information
/// between calls.
pub trait LpBackend: std::fmt::Debug {
    /// Solves the given snapshot. `iter_limit` of `None` means no limit.
    fn solve(&mut self, data: &LpData, tol: &Tolerances, iter_limit: Option<u64>) -> LpResult;
}
