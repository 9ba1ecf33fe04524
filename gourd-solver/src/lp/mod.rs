//! The LP relaxation manager.
//!
//! Wraps the column/row arenas of the active relaxation, the flush discipline towards the
//! backend, the reversible diving overlay, and strong branching. Probing is a tree-level
//! overlay; the LP only sees it through changed column bounds.

mod interface;
mod simplex;

pub use interface::LpBackend;
pub use interface::LpData;
pub use interface::LpResult;
pub use interface::LpStatus;
pub use simplex::SimplexBackend;

use crate::containers::KeyedVec;
use crate::containers::StorageKey;
use crate::gourd_assert_simple;
use crate::model::VarId;
use crate::num::Tolerances;
use crate::results::Error;
use crate::results::GourdResult;
use crate::storage_key;

use fnv::FnvHashMap;

storage_key!(ColId, "col");
storage_key!(RowId, "row");

/// A column of the active LP, wrapping a transformed variable.
#[derive(Clone, Copy, Debug)]
pub struct Col {
    pub var: VarId,
    pub obj: f64,
    pub lb: f64,
    pub ub: f64,
    pub integral: bool,
}

/// A row of the active LP: `lhs <= a'x + constant <= rhs`.
#[derive(Clone, Debug)]
pub struct Row {
    pub name: String,
    pub lhs: f64,
    pub rhs: f64,
    pub terms: Vec<(ColId, f64)>,
    pub constant: f64,
    /// Only valid in the subtree the row was created in.
    pub local: bool,
    pub removable: bool,
    /// Modifiable rows are excluded from cut aggregation.
    pub modifiable: bool,
    pub age: f64,
    /// Aggregation rank: 0 for model rows, 1 + max input rank for derived cuts.
    pub rank: i32,
}

/// The norm used to scale cut violations into efficacy values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EfficacyNorm {
    #[default]
    Euclidean,
    Maximum,
    Sum,
    /// Count of nonzeros.
    Discrete,
}

impl Row {
    /// The activity `a'x + constant` of the row under the given column values.
    pub fn activity(&self, col_value: &dyn Fn(ColId) -> f64) -> f64 {
        self.terms
            .iter()
            .map(|&(col, coef)| coef * col_value(col))
            .sum::<f64>()
            + self.constant
    }

    /// The feasibility of the row: negative iff violated.
    pub fn feasibility(&self, col_value: &dyn Fn(ColId) -> f64, tol: &Tolerances) -> f64 {
        let activity = self.activity(col_value);
        let lhs_slack = if tol.is_neg_infinity(self.lhs) {
            f64::INFINITY
        } else {
            activity - self.lhs
        };
        let rhs_slack = if tol.is_infinity(self.rhs) {
            f64::INFINITY
        } else {
            self.rhs - activity
        };
        lhs_slack.min(rhs_slack)
    }

    pub fn norm(&self, which: EfficacyNorm) -> f64 {
        match which {
            EfficacyNorm::Euclidean => self
                .terms
                .iter()
                .map(|&(_, coef)| coef * coef)
                .sum::<f64>()
                .sqrt(),
            EfficacyNorm::Maximum => self
                .terms
                .iter()
                .map(|&(_, coef)| coef.abs())
                .fold(0.0, f64::max),
            EfficacyNorm::Sum => self.terms.iter().map(|&(_, coef)| coef.abs()).sum(),
            EfficacyNorm::Discrete => self.terms.len() as f64,
        }
    }

    /// Efficacy of the row as a cut: violation scaled by the norm.
    pub fn efficacy(
        &self,
        col_value: &dyn Fn(ColId) -> f64,
        tol: &Tolerances,
        norm: EfficacyNorm,
    ) -> f64 {
        let norm_value = self.norm(norm).max(1e-6);
        -self.feasibility(col_value, tol) / norm_value
    }
}

/// LP access states; diving is a reentrant overlay on top of `Flushed`/`Modified`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LpState {
    #[default]
    NotConstructed,
    Constructed,
    /// All pending changes are known to the backend.
    Flushed,
    /// Columns/rows changed since the last flush.
    Modified,
}

#[derive(Clone, Debug)]
struct DiveSnapshot {
    cols: Vec<(f64, f64, f64)>,
    row_sides: Vec<(f64, f64)>,
    n_rows: usize,
}

/// The outcome of a strong-branching evaluation of one candidate.
#[derive(Clone, Copy, Debug)]
pub struct StrongBranchResult {
    pub down_bound: f64,
    pub up_bound: f64,
    /// Whether the corresponding bound is a valid dual bound (solved to optimality or proven
    /// infeasible) rather than an iteration-limited guess.
    pub down_valid: bool,
    pub up_valid: bool,
    pub down_infeasible: bool,
    pub up_infeasible: bool,
    /// Whether a conflict constraint was derived for the branch (only with propagation).
    pub down_conflict: bool,
    pub up_conflict: bool,
    pub lperror: bool,
}

/// The LP relaxation of the focus node.
#[derive(Debug)]
pub struct Lp {
    pub state: LpState,
    cols: KeyedVec<ColId, Col>,
    col_of_var: FnvHashMap<VarId, ColId>,
    rows: KeyedVec<RowId, Row>,
    backend: Box<dyn LpBackend>,
    /// Result of the most recent solve; invalidated by modifications.
    pub last_result: Option<LpResult>,
    diving: Option<DiveSnapshot>,
    strongbranching: bool,
    pub n_solves: u64,
    pub n_iterations: u64,
    pub n_strongbranches: u64,
    pub strongbranch_iterations: u64,
}

impl Default for Lp {
    fn default() -> Self {
        Lp::new(Box::new(SimplexBackend::default()))
    }
}

impl Lp {
    pub fn new(backend: Box<dyn LpBackend>) -> Lp {
        Lp {
            state: LpState::NotConstructed,
            cols: KeyedVec::default(),
            col_of_var: FnvHashMap::default(),
            rows: KeyedVec::default(),
            backend,
            last_result: None,
            diving: None,
            strongbranching: false,
            n_solves: 0,
            n_iterations: 0,
            n_strongbranches: 0,
            strongbranch_iterations: 0,
        }
    }

    /// Discards all columns and rows (used when the search is torn down).
    pub fn clear(&mut self) {
        gourd_assert_simple!(self.diving.is_none() && !self.strongbranching);
        self.state = LpState::NotConstructed;
        self.cols.clear();
        self.col_of_var.clear();
        self.rows.clear();
        self.last_result = None;
    }

    pub fn n_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn col_of(&self, var: VarId) -> Option<ColId> {
        self.col_of_var.get(&var).copied()
    }

    pub fn col(&self, col: ColId) -> &Col {
        &self.cols[col]
    }

    pub fn row(&self, row: RowId) -> &Row {
        &self.rows[row]
    }

    pub fn rows(&self) -> impl Iterator<Item = (RowId, &Row)> {
        self.rows.keys().zip(self.rows.iter())
    }

    pub fn add_col(&mut self, col: Col) -> ColId {
        gourd_assert_simple!(!self.col_of_var.contains_key(&col.var));
        let id = self.cols.push(col);
        let _ = self.col_of_var.insert(col.var, id);
        self.mark_modified();
        id
    }

    pub fn add_row(&mut self, row: Row) -> RowId {
        let id = self.rows.push(row);
        self.mark_modified();
        id
    }

    /// Synchronises a column with the local bounds of its variable.
    pub fn set_col_bounds(&mut self, col: ColId, lb: f64, ub: f64) {
        if self.cols[col].lb != lb || self.cols[col].ub != ub {
            self.cols[col].lb = lb;
            self.cols[col].ub = ub;
            self.mark_modified();
        }
    }

    pub fn set_col_obj(&mut self, col: ColId, obj: f64) {
        if self.cols[col].obj != obj {
            self.cols[col].obj = obj;
            self.mark_modified();
        }
    }

    /// Removes all rows at or beyond `keep`, e.g. when leaving a subtree with local rows.
    pub fn shrink_rows(&mut self, keep: usize) {
        if keep < self.rows.len() {
            self.rows.truncate(keep);
            self.mark_modified();
        }
    }

    fn mark_modified(&mut self) {
        self.last_result = None;
        self.state = match self.state {
            LpState::NotConstructed => LpState::NotConstructed,
            _ => LpState::Modified,
        };
    }

    /// Marks the LP constructed once columns/rows for the focus node are assembled.
    pub fn mark_constructed(&mut self) {
        if self.state == LpState::NotConstructed {
            self.state = LpState::Constructed;
        }
    }

    pub fn is_constructed(&self) -> bool {
        self.state != LpState::NotConstructed
    }

    /// Pushes pending modifications to the backend.
    ///
    /// The bundled backend consumes a snapshot per solve, so flushing only settles the state;
    /// an incremental backend would receive the pending change queues here.
    pub fn flush(&mut self) {
        gourd_assert_simple!(self.state != LpState::NotConstructed);
        self.state = LpState::Flushed;
    }

    fn snapshot(&self, obj_offset: f64) -> LpData {
        let mut data = LpData {
            obj_offset,
            ..LpData::default()
        };
        for col in self.cols.iter() {
            data.obj.push(col.obj);
            data.col_lb.push(col.lb);
            data.col_ub.push(col.ub);
        }
        for row in self.rows.iter() {
            data.rows.push(
                row.terms
                    .iter()
                    .map(|&(col, coef)| (col.index(), coef))
                    .collect(),
            );
            data.row_lhs.push(row.lhs - row.constant);
            data.row_rhs.push(row.rhs - row.constant);
        }
        data
    }

    /// Solves the current relaxation, flushing first if necessary.
    pub fn solve(
        &mut self,
        tol: &Tolerances,
        obj_offset: f64,
        iter_limit: Option<u64>,
    ) -> GourdResult<LpStatus> {
        if self.state == LpState::NotConstructed {
            return Err(Error::InvalidCall {
                operation: "solve_lp",
                stage: crate::Stage::Solving,
            });
        }
        self.flush();
        let data = self.snapshot(obj_offset);
        let result = self.backend.solve(&data, tol, iter_limit);
        self.n_solves += 1;
        self.n_iterations += result.iterations;
        let status = result.status;
        if status == LpStatus::Error {
            self.last_result = None;
            return Err(Error::LpError("backend reported a numerical error".into()));
        }
        self.last_result = Some(result);
        Ok(status)
    }

    /// Value of the given column in the last LP solution.
    pub fn col_primal(&self, col: ColId) -> f64 {
        self.last_result
            .as_ref()
            .map(|result| result.primal[col.index()])
            .unwrap_or(0.0)
    }

    pub fn obj_val(&self) -> f64 {
        self.last_result
            .as_ref()
            .map(|result| result.obj_val)
            .unwrap_or(f64::NAN)
    }

    pub fn has_solution(&self) -> bool {
        self.last_result
            .as_ref()
            .is_some_and(|result| result.status == LpStatus::Optimal)
    }

    pub fn ray_value(&self, col: ColId) -> f64 {
        self.last_result
            .as_ref()
            .and_then(|result| result.ray.get(col.index()).copied())
            .unwrap_or(0.0)
    }

    // --- diving -------------------------------------------------------------------------

    pub fn in_dive(&self) -> bool {
        self.diving.is_some()
    }

    /// Enters diving mode: all column/row modifications until [`Lp::end_dive`] are recorded
    /// against a snapshot and reverted on exit.
    pub fn start_dive(&mut self) -> GourdResult<()> {
        if self.diving.is_some() || self.strongbranching {
            return Err(Error::InvalidCall {
                operation: "start_dive",
                stage: crate::Stage::Solving,
            });
        }
        self.diving = Some(DiveSnapshot {
            cols: self
                .cols
                .iter()
                .map(|col| (col.obj, col.lb, col.ub))
                .collect(),
            row_sides: self.rows.iter().map(|row| (row.lhs, row.rhs)).collect(),
            n_rows: self.rows.len(),
        });
        Ok(())
    }

    /// Leaves diving mode, restoring every column objective and bound and every row side to
    /// its pre-dive value and dropping rows added during the dive.
    pub fn end_dive(&mut self) -> GourdResult<()> {
        let Some(snapshot) = self.diving.take() else {
            return Err(Error::InvalidCall {
                operation: "end_dive",
                stage: crate::Stage::Solving,
            });
        };
        for (col, (obj, lb, ub)) in self.cols.iter_mut().zip(snapshot.cols) {
            col.obj = obj;
            col.lb = lb;
            col.ub = ub;
        }
        self.rows.truncate(snapshot.n_rows);
        for (row, (lhs, rhs)) in self.rows.iter_mut().zip(snapshot.row_sides) {
            row.lhs = lhs;
            row.rhs = rhs;
        }
        self.mark_modified();
        Ok(())
    }

    fn require_dive(&self, operation: &'static str) -> GourdResult<()> {
        if self.diving.is_none() {
            return Err(Error::InvalidCall {
                operation,
                stage: crate::Stage::Solving,
            });
        }
        Ok(())
    }

    pub fn chg_col_obj_dive(&mut self, col: ColId, obj: f64) -> GourdResult<()> {
        self.require_dive("chg_var_obj_dive")?;
        self.set_col_obj(col, obj);
        Ok(())
    }

    pub fn chg_col_bounds_dive(&mut self, col: ColId, lb: f64, ub: f64) -> GourdResult<()> {
        self.require_dive("chg_var_bounds_dive")?;
        self.set_col_bounds(col, lb, ub);
        Ok(())
    }

    pub fn chg_row_sides_dive(&mut self, row: RowId, lhs: f64, rhs: f64) -> GourdResult<()> {
        self.require_dive("chg_row_sides_dive")?;
        self.rows[row].lhs = lhs;
        self.rows[row].rhs = rhs;
        self.mark_modified();
        Ok(())
    }

    pub fn add_row_dive(&mut self, row: Row) -> GourdResult<RowId> {
        self.require_dive("add_row_dive")?;
        Ok(self.add_row(row))
    }

    // --- strong branching ---------------------------------------------------------------

    pub fn in_strongbranch(&self) -> bool {
        self.strongbranching
    }

    pub fn start_strongbranch(&mut self) -> GourdResult<()> {
        if self.diving.is_some() || self.strongbranching {
            return Err(Error::InvalidCall {
                operation: "start_strongbranch",
                stage: crate::Stage::Solving,
            });
        }
        self.strongbranching = true;
        Ok(())
    }

    pub fn end_strongbranch(&mut self) -> GourdResult<()> {
        if !self.strongbranching {
            return Err(Error::InvalidCall {
                operation: "end_strongbranch",
                stage: crate::Stage::Solving,
            });
        }
        self.strongbranching = false;
        Ok(())
    }

    /// Evaluates branching on the column around `value` by provisionally solving both branch
    /// LPs. The column bounds are restored before returning on every path.
    pub fn strongbranch(
        &mut self,
        col: ColId,
        value: f64,
        tol: &Tolerances,
        obj_offset: f64,
        iter_limit: Option<u64>,
    ) -> GourdResult<StrongBranchResult> {
        if !self.strongbranching {
            return Err(Error::InvalidCall {
                operation: "get_var_strongbranch",
                stage: crate::Stage::Solving,
            });
        }
        let saved = (self.cols[col].lb, self.cols[col].ub);
        let integral = self.cols[col].integral;
        let (down_ub, up_lb) = if integral {
            (tol.feas_floor(value), tol.feas_ceil(value))
        } else {
            (value, value)
        };
        self.n_strongbranches += 1;

        let mut result = StrongBranchResult {
            down_bound: -f64::INFINITY,
            up_bound: -f64::INFINITY,
            down_valid: false,
            up_valid: false,
            down_infeasible: false,
            up_infeasible: false,
            down_conflict: false,
            up_conflict: false,
            lperror: false,
        };

        for downwards in [true, false] {
            self.cols[col].lb = saved.0;
            self.cols[col].ub = saved.1;
            if downwards {
                self.cols[col].ub = down_ub;
            } else {
                self.cols[col].lb = up_lb;
            }
            self.mark_modified();

            let data = self.snapshot(obj_offset);
            let branch = self.backend.solve(&data, tol, iter_limit);
            self.strongbranch_iterations += branch.iterations;
            let (bound, valid, infeasible) = match branch.status {
                LpStatus::Optimal => (branch.obj_val, true, false),
                LpStatus::Infeasible => (f64::INFINITY, true, true),
                LpStatus::UnboundedRay => (-f64::INFINITY, true, false),
                LpStatus::IterLimit | LpStatus::TimeLimit => (branch.obj_val, false, false),
                LpStatus::Error => {
                    result.lperror = true;
                    (-f64::INFINITY, false, false)
                }
            };
            if downwards {
                result.down_bound = bound;
                result.down_valid = valid;
                result.down_infeasible = infeasible;
            } else {
                result.up_bound = bound;
                result.up_valid = valid;
                result.up_infeasible = infeasible;
            }
        }

        self.cols[col].lb = saved.0;
        self.cols[col].ub = saved.1;
        self.mark_modified();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::StorageKey;

    fn simple_lp() -> (Lp, ColId, ColId, RowId) {
        // min x + y  s.t.  x + y >= 3,  x, y in [0, 10]
        let mut lp = Lp::default();
        let x = lp.add_col(Col {
            var: VarId::create_from_index(0),
            obj: 1.0,
            lb: 0.0,
            ub: 10.0,
            integral: false,
        });
        let y = lp.add_col(Col {
            var: VarId::create_from_index(1),
            obj: 1.0,
            lb: 0.0,
            ub: 10.0,
            integral: false,
        });
        let row = lp.add_row(Row {
            name: "cover".into(),
            lhs: 3.0,
            rhs: f64::INFINITY,
            terms: vec![(x, 1.0), (y, 1.0)],
            constant: 0.0,
            local: false,
            removable: false,
            modifiable: false,
            age: 0.0,
            rank: 0,
        });
        lp.mark_constructed();
        (lp, x, y, row)
    }

    #[test]
    fn solving_a_simple_lp_reaches_the_optimum() {
        let (mut lp, x, y, _) = simple_lp();
        let tol = Tolerances::default();

        let status = lp.solve(&tol, 0.0, None).unwrap();
        assert_eq!(LpStatus::Optimal, status);
        assert!((lp.obj_val() - 3.0).abs() < 1e-6);
        assert!((lp.col_primal(x) + lp.col_primal(y) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn dive_modifications_are_reverted_on_end_dive() {
        let (mut lp, x, _, row) = simple_lp();
        let tol = Tolerances::default();

        lp.start_dive().unwrap();
        lp.chg_col_obj_dive(x, -5.0).unwrap();
        lp.chg_col_bounds_dive(x, 1.0, 4.0).unwrap();
        lp.chg_row_sides_dive(row, 0.0, 8.0).unwrap();
        let extra = lp
            .add_row_dive(Row {
                name: "dive".into(),
                lhs: -f64::INFINITY,
                rhs: 2.0,
                terms: vec![(x, 1.0)],
                constant: 0.0,
                local: true,
                removable: true,
                modifiable: false,
                age: 0.0,
                rank: 1,
            })
            .unwrap();
        let _ = lp.solve(&tol, 0.0, None).unwrap();
        assert_eq!(2, lp.n_rows());
        let _ = extra;

        lp.end_dive().unwrap();
        assert_eq!(1, lp.n_rows());
        assert_eq!(1.0, lp.col(x).obj);
        assert_eq!(0.0, lp.col(x).lb);
        assert_eq!(10.0, lp.col(x).ub);
        assert_eq!(3.0, lp.row(row).lhs);
    }

    #[test]
    fn diving_is_exclusive() {
        let (mut lp, _, _, _) = simple_lp();
        lp.start_dive().unwrap();
        assert!(lp.start_dive().is_err());
        assert!(lp.start_strongbranch().is_err());
        lp.end_dive().unwrap();
        assert!(lp.end_dive().is_err());
    }

    #[test]
    fn strong_branching_restores_bounds_and_reports_both_children() {
        // min x  s.t. x + y >= 3, x,y integral in [0,10]; at the LP optimum x is 0 (y covers).
        let (mut lp, x, _, _) = simple_lp();
        let tol = Tolerances::default();
        let _ = lp.solve(&tol, 0.0, None).unwrap();

        lp.start_strongbranch().unwrap();
        let result = lp.strongbranch(x, 1.5, &tol, 0.0, None).unwrap();
        lp.end_strongbranch().unwrap();

        assert!(result.down_valid && result.up_valid);
        assert!(!result.down_infeasible && !result.up_infeasible);
        // Both children keep objective 3 (the row can still be covered).
        assert!((result.down_bound - 3.0).abs() < 1e-6);
        assert!((result.up_bound - 3.0).abs() < 1e-6);
        assert_eq!(0.0, lp.col(x).lb);
        assert_eq!(10.0, lp.col(x).ub);
        assert_eq!(1, lp.n_strongbranches);
    }

    #[test]
    fn row_efficacy_scales_violation_by_norm() {
        let (lp, x, y, row) = simple_lp();
        let _ = lp;
        let tol = Tolerances::default();
        let row = Row {
            terms: vec![(x, 3.0), (y, 4.0)],
            lhs: 10.0,
            rhs: f64::INFINITY,
            ..Row {
                name: "e".into(),
                lhs: 0.0,
                rhs: 0.0,
                terms: vec![],
                constant: 0.0,
                local: false,
                removable: false,
                modifiable: false,
                age: 0.0,
                rank: 0,
            }
        };
        let _ = row.name.clone();
        // At the origin the row 3x + 4y >= 10 is violated by 10; the L2 norm is 5.
        let efficacy = row.efficacy(&|_| 0.0, &tol, EfficacyNorm::Euclidean);
        assert!((efficacy - 2.0).abs() < 1e-9);
        assert_eq!(5.0, row.norm(EfficacyNorm::Euclidean));
        assert_eq!(4.0, row.norm(EfficacyNorm::Maximum));
        assert_eq!(7.0, row.norm(EfficacyNorm::Sum));
        assert_eq!(2.0, row.norm(EfficacyNorm::Discrete));
    }
}
