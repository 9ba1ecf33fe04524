//! A bundled dense two-phase simplex.
//!
//! This backend exists so the driver is usable out of the box and so the test suite has a
//! deterministic LP oracle. It rebuilds the tableau from scratch on every call and uses
//! Bland's rule throughout, so it is robust rather than fast; an external simplex code can be
//! plugged in through [`super::LpBackend`] without touching the driver.

use super::LpBackend;
use super::LpData;
use super::LpResult;
use super::LpStatus;
use crate::gourd_assert_moderate;
use crate::num::Tolerances;

#[derive(Debug, Default)]
pub struct SimplexBackend;

/// How an original column maps onto the nonnegative structural variables of the tableau.
#[derive(Clone, Copy, Debug)]
enum ColMap {
    /// `x = offset + u`.
    Shift { idx: usize, offset: f64 },
    /// `x = offset - u` (finite upper bound, free below).
    Mirror { idx: usize, offset: f64 },
    /// `x = pos - neg` (free in both directions).
    Split { pos: usize, neg: usize },
}

enum PhaseOutcome {
    Optimal,
    /// Entering column with an empty ratio test.
    Unbounded(usize),
    IterLimit,
}

struct Tableau {
    /// One row per constraint, `n_total` coefficients plus the right-hand side.
    rows: Vec<Vec<f64>>,
    /// Reduced-cost row, last entry is the negated objective value.
    cost: Vec<f64>,
    basis: Vec<usize>,
    n_total: usize,
    iterations: u64,
}

impl Tableau {
    fn pivot(&mut self, row: usize, col: usize) {
        let pivot = self.rows[row][col];
        gourd_assert_moderate!(pivot.abs() > 1e-12);
        for entry in self.rows[row].iter_mut() {
            *entry /= pivot;
        }
        for other in 0..self.rows.len() {
            if other == row {
                continue;
            }
            let factor = self.rows[other][col];
            if factor != 0.0 {
                for j in 0..=self.n_total {
                    let delta = factor * self.rows[row][j];
                    self.rows[other][j] -= delta;
                }
            }
        }
        let factor = self.cost[col];
        if factor != 0.0 {
            for j in 0..=self.n_total {
                let delta = factor * self.rows[row][j];
                self.cost[j] -= delta;
            }
        }
        self.basis[row] = col;
        self.iterations += 1;
    }

    /// Prices the cost row against the current basis so basic columns have zero reduced cost.
    fn price_out_basis(&mut self, costs: &[f64]) {
        self.cost = costs.to_vec();
        self.cost.push(0.0);
        for (row, &basic) in self.basis.iter().enumerate() {
            let factor = self.cost[basic];
            if factor != 0.0 {
                for j in 0..=self.n_total {
                    let delta = factor * self.rows[row][j];
                    self.cost[j] -= delta;
                }
            }
        }
    }

    /// Runs Bland-rule pivots until optimality, unboundedness, or the iteration limit.
    ///
    /// `enterable` bounds the columns allowed to enter the basis (used to lock out phase-1
    /// artificials during phase 2).
    fn run(&mut self, tol: &Tolerances, enterable: usize, iter_limit: Option<u64>) -> PhaseOutcome {
        loop {
            if iter_limit.is_some_and(|limit| self.iterations >= limit) {
                return PhaseOutcome::IterLimit;
            }
            let Some(entering) = (0..enterable).find(|&j| self.cost[j] < -tol.eps) else {
                return PhaseOutcome::Optimal;
            };
            let mut leaving: Option<usize> = None;
            let mut best_ratio = f64::INFINITY;
            for row in 0..self.rows.len() {
                let coef = self.rows[row][entering];
                if coef > tol.eps {
                    let ratio = self.rows[row][self.n_total] / coef;
                    let better = ratio < best_ratio - tol.eps
                        || (ratio < best_ratio + tol.eps
                            && leaving.is_some_and(|prev| self.basis[row] < self.basis[prev]));
                    if better || leaving.is_none() {
                        best_ratio = ratio.min(best_ratio);
                        leaving = Some(row);
                    }
                }
            }
            let Some(leaving) = leaving else {
                return PhaseOutcome::Unbounded(entering);
            };
            self.pivot(leaving, entering);
        }
    }

    fn objective(&self) -> f64 {
        -self.cost[self.n_total]
    }

    fn value_of(&self, col: usize) -> f64 {
        self.basis
            .iter()
            .position(|&basic| basic == col)
            .map(|row| self.rows[row][self.n_total])
            .unwrap_or(0.0)
    }
}

impl LpBackend for SimplexBackend {
    fn solve(&mut self, data: &LpData, tol: &Tolerances, iter_limit: Option<u64>) -> LpResult {
        let n_orig = data.obj.len();

        // Map every original column onto nonnegative structurals; finite upper bounds of
        // shifted columns become extra <= rows.
        let mut maps = Vec::with_capacity(n_orig);
        let mut n_struct = 0usize;
        let mut ub_rows: Vec<(usize, f64)> = Vec::new();
        for j in 0..n_orig {
            let (lb, ub) = (data.col_lb[j], data.col_ub[j]);
            if !tol.is_neg_infinity(lb) {
                maps.push(ColMap::Shift {
                    idx: n_struct,
                    offset: lb,
                });
                if !tol.is_infinity(ub) {
                    if ub < lb {
                        return infeasible_result();
                    }
                    ub_rows.push((n_struct, ub - lb));
                }
                n_struct += 1;
            } else if !tol.is_infinity(ub) {
                maps.push(ColMap::Mirror {
                    idx: n_struct,
                    offset: ub,
                });
                n_struct += 1;
            } else {
                maps.push(ColMap::Split {
                    pos: n_struct,
                    neg: n_struct + 1,
                });
                n_struct += 2;
            }
        }

        // Structural objective.
        let mut struct_obj = vec![0.0; n_struct];
        for (j, map) in maps.iter().enumerate() {
            let coef = data.obj[j];
            match *map {
                ColMap::Shift { idx, .. } => struct_obj[idx] += coef,
                ColMap::Mirror { idx, .. } => struct_obj[idx] -= coef,
                ColMap::Split { pos, neg } => {
                    struct_obj[pos] += coef;
                    struct_obj[neg] -= coef;
                }
            }
        }

        // Constraints in structural space: (dense coefficients, rhs, is_equality).
        let mut constraints: Vec<(Vec<f64>, f64, bool)> = Vec::new();
        for (i, terms) in data.rows.iter().enumerate() {
            let mut coefs = vec![0.0; n_struct];
            let mut constant = 0.0;
            for &(j, coef) in terms {
                match maps[j] {
                    ColMap::Shift { idx, offset } => {
                        coefs[idx] += coef;
                        constant += coef * offset;
                    }
                    ColMap::Mirror { idx, offset } => {
                        coefs[idx] -= coef;
                        constant += coef * offset;
                    }
                    ColMap::Split { pos, neg } => {
                        coefs[pos] += coef;
                        coefs[neg] -= coef;
                    }
                }
            }
            let lhs = data.row_lhs[i];
            let rhs = data.row_rhs[i];
            if !tol.is_neg_infinity(lhs) && !tol.is_infinity(rhs) && lhs == rhs {
                constraints.push((coefs, rhs - constant, true));
                continue;
            }
            if !tol.is_infinity(rhs) {
                constraints.push((coefs.clone(), rhs - constant, false));
            }
            if !tol.is_neg_infinity(lhs) {
                let negated: Vec<f64> = coefs.iter().map(|&c| -c).collect();
                constraints.push((negated, constant - lhs, false));
            }
        }
        for &(idx, bound) in &ub_rows {
            let mut coefs = vec![0.0; n_struct];
            coefs[idx] = 1.0;
            constraints.push((coefs, bound, false));
        }

        let m = constraints.len();
        let n_slack = constraints.iter().filter(|&&(_, _, eq)| !eq).count();
        // Worst case one artificial per row.
        let n_total = n_struct + n_slack + m;
        let artificial_start = n_struct + n_slack;

        let mut tableau = Tableau {
            rows: Vec::with_capacity(m),
            cost: Vec::new(),
            basis: Vec::with_capacity(m),
            n_total,
            iterations: 0,
        };
        let mut phase1_costs = vec![0.0; n_total];
        let mut n_artificial = 0usize;
        let mut slack = n_struct;
        for (coefs, rhs, is_eq) in constraints {
            let mut row = vec![0.0; n_total + 1];
            row[..n_struct].copy_from_slice(&coefs);
            let mut slack_col = None;
            if !is_eq {
                row[slack] = 1.0;
                slack_col = Some(slack);
                slack += 1;
            }
            row[n_total] = rhs;
            if rhs < 0.0 {
                for entry in row.iter_mut() {
                    *entry = -*entry;
                }
            }
            // The slack is a valid starting basis column only when its coefficient stayed +1.
            let basic = match slack_col {
                Some(col) if row[col] > 0.5 => col,
                _ => {
                    let artificial = artificial_start + n_artificial;
                    n_artificial += 1;
                    row[artificial] = 1.0;
                    phase1_costs[artificial] = 1.0;
                    artificial
                }
            };
            tableau.basis.push(basic);
            tableau.rows.push(row);
        }

        // Phase 1: drive the artificials to zero.
        if n_artificial > 0 {
            tableau.price_out_basis(&phase1_costs);
            match tableau.run(tol, artificial_start + n_artificial, iter_limit) {
                PhaseOutcome::Optimal => {}
                PhaseOutcome::Unbounded(_) => return LpResult::error(),
                PhaseOutcome::IterLimit => {
                    return limited_result(&tableau, &maps, data, n_orig, LpStatus::IterLimit);
                }
            }
            if tableau.objective() > tol.feastol {
                let mut result = infeasible_result();
                result.iterations = tableau.iterations;
                return result;
            }
            // Pivot remaining artificials out of the basis where possible; rows where that
            // fails are redundant and harmless at level zero.
            for row in 0..m {
                if tableau.basis[row] >= artificial_start {
                    if let Some(col) =
                        (0..artificial_start).find(|&j| tableau.rows[row][j].abs() > tol.eps)
                    {
                        tableau.pivot(row, col);
                    }
                }
            }
        }

        // Phase 2 on the real objective; artificials are locked out of the basis.
        let mut phase2_costs = vec![0.0; n_total];
        phase2_costs[..n_struct].copy_from_slice(&struct_obj);
        tableau.price_out_basis(&phase2_costs);
        match tableau.run(tol, artificial_start, iter_limit) {
            PhaseOutcome::Optimal => {
                let primal = extract_primal(&tableau, &maps, n_orig);
                let obj_val = data
                    .obj
                    .iter()
                    .zip(&primal)
                    .map(|(c, x)| c * x)
                    .sum::<f64>()
                    + data.obj_offset;
                LpResult {
                    status: LpStatus::Optimal,
                    obj_val,
                    primal,
                    dual: Vec::new(),
                    ray: Vec::new(),
                    iterations: tableau.iterations,
                }
            }
            PhaseOutcome::Unbounded(entering) => {
                let primal = extract_primal(&tableau, &maps, n_orig);
                let mut struct_ray = vec![0.0; n_struct];
                if entering < n_struct {
                    struct_ray[entering] = 1.0;
                }
                for row in 0..m {
                    let basic = tableau.basis[row];
                    if basic < n_struct {
                        struct_ray[basic] -= tableau.rows[row][entering];
                    }
                }
                let ray = map_to_original(&struct_ray, &maps, n_orig, false);
                LpResult {
                    status: LpStatus::UnboundedRay,
                    obj_val: -f64::INFINITY,
                    primal,
                    dual: Vec::new(),
                    ray,
                    iterations: tableau.iterations,
                }
            }
            PhaseOutcome::IterLimit => {
                limited_result(&tableau, &maps, data, n_orig, LpStatus::IterLimit)
            }
        }
    }
}

fn extract_primal(tableau: &Tableau, maps: &[ColMap], n_orig: usize) -> Vec<f64> {
    let n_struct = maps
        .iter()
        .map(|map| match *map {
            ColMap::Shift { idx, .. } | ColMap::Mirror { idx, .. } => idx + 1,
            ColMap::Split { neg, .. } => neg + 1,
        })
        .max()
        .unwrap_or(0);
    let struct_values: Vec<f64> = (0..n_struct).map(|col| tableau.value_of(col)).collect();
    map_to_original(&struct_values, maps, n_orig, true)
}

/// Maps structural values back to original columns; `with_offset` distinguishes points from
/// directions.
fn map_to_original(
    struct_values: &[f64],
    maps: &[ColMap],
    n_orig: usize,
    with_offset: bool,
) -> Vec<f64> {
    let mut values = vec![0.0; n_orig];
    for (j, map) in maps.iter().enumerate() {
        values[j] = match *map {
            ColMap::Shift { idx, offset } => {
                struct_values[idx] + if with_offset { offset } else { 0.0 }
            }
            ColMap::Mirror { idx, offset } => {
                -struct_values[idx] + if with_offset { offset } else { 0.0 }
            }
            ColMap::Split { pos, neg } => struct_values[pos] - struct_values[neg],
        };
    }
    values
}

fn limited_result(
    tableau: &Tableau,
    maps: &[ColMap],
    data: &LpData,
    n_orig: usize,
    status: LpStatus,
) -> LpResult {
    let primal = extract_primal(tableau, maps, n_orig);
    let obj_val = data
        .obj
        .iter()
        .zip(&primal)
        .map(|(c, x)| c * x)
        .sum::<f64>()
        + data.obj_offset;
    LpResult {
        status,
        obj_val,
        primal,
        dual: Vec::new(),
        ray: Vec::new(),
        iterations: tableau.iterations,
    }
}

fn infeasible_result() -> LpResult {
    LpResult {
        status: LpStatus::Infeasible,
        obj_val: f64::INFINITY,
        primal: Vec::new(),
        dual: Vec::new(),
        ray: Vec::new(),
        iterations: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve(data: &LpData) -> LpResult {
        SimplexBackend.solve(data, &Tolerances::default(), None)
    }

    #[test]
    fn bounded_minimum_on_a_box() {
        // min -x - 2y  s.t.  x + y <= 4, x <= 3, y <= 3, x,y >= 0
        let data = LpData {
            obj: vec![-1.0, -2.0],
            col_lb: vec![0.0, 0.0],
            col_ub: vec![3.0, 3.0],
            rows: vec![vec![(0, 1.0), (1, 1.0)]],
            row_lhs: vec![-f64::INFINITY],
            row_rhs: vec![4.0],
            obj_offset: 0.0,
        };
        let result = solve(&data);
        assert_eq!(LpStatus::Optimal, result.status);
        assert!((result.obj_val + 7.0).abs() < 1e-6);
        assert!((result.primal[0] - 1.0).abs() < 1e-6);
        assert!((result.primal[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn equality_rows_and_offsets() {
        // min x + y + 1  s.t.  x + y = 3
        let data = LpData {
            obj: vec![1.0, 1.0],
            col_lb: vec![0.0, 0.0],
            col_ub: vec![f64::INFINITY, f64::INFINITY],
            rows: vec![vec![(0, 1.0), (1, 1.0)]],
            row_lhs: vec![3.0],
            row_rhs: vec![3.0],
            obj_offset: 1.0,
        };
        let result = solve(&data);
        assert_eq!(LpStatus::Optimal, result.status);
        assert!((result.obj_val - 4.0).abs() < 1e-6);
        assert!((result.primal[0] + result.primal[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn infeasible_system_is_detected() {
        // x >= 2 and x <= 1
        let data = LpData {
            obj: vec![0.0],
            col_lb: vec![0.0],
            col_ub: vec![1.0],
            rows: vec![vec![(0, 1.0)]],
            row_lhs: vec![2.0],
            row_rhs: vec![f64::INFINITY],
            obj_offset: 0.0,
        };
        let result = solve(&data);
        assert_eq!(LpStatus::Infeasible, result.status);
    }

    #[test]
    fn unbounded_problem_reports_an_improving_ray() {
        // min -x  s.t.  x >= 1, x free above
        let data = LpData {
            obj: vec![-1.0],
            col_lb: vec![1.0],
            col_ub: vec![f64::INFINITY],
            rows: vec![],
            row_lhs: vec![],
            row_rhs: vec![],
            obj_offset: 0.0,
        };
        let result = solve(&data);
        assert_eq!(LpStatus::UnboundedRay, result.status);
        assert!(result.ray[0] > 0.5);
    }

    #[test]
    fn free_variable_unbounded_below() {
        // min x with x free: ray must point in the negative direction.
        let data = LpData {
            obj: vec![1.0],
            col_lb: vec![-f64::INFINITY],
            col_ub: vec![f64::INFINITY],
            rows: vec![],
            row_lhs: vec![],
            row_rhs: vec![],
            obj_offset: 0.0,
        };
        let result = solve(&data);
        assert_eq!(LpStatus::UnboundedRay, result.status);
        assert!(result.ray[0] < -0.5);
    }

    #[test]
    fn mirrored_column_is_mapped_back() {
        // min x with x <= 5, free below, plus a row keeping it above 2.
        let data = LpData {
            obj: vec![1.0],
            col_lb: vec![-f64::INFINITY],
            col_ub: vec![5.0],
            rows: vec![vec![(0, 1.0)]],
            row_lhs: vec![2.0],
            row_rhs: vec![f64::INFINITY],
            obj_offset: 0.0,
        };
        let result = solve(&data);
        assert_eq!(LpStatus::Optimal, result.status);
        assert!((result.primal[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn negative_lower_bounds_shift_correctly() {
        // min x + y  s.t. x + y >= -3, x,y in [-5, 5]
        let data = LpData {
            obj: vec![1.0, 1.0],
            col_lb: vec![-5.0, -5.0],
            col_ub: vec![5.0, 5.0],
            rows: vec![vec![(0, 1.0), (1, 1.0)]],
            row_lhs: vec![-3.0],
            row_rhs: vec![f64::INFINITY],
            obj_offset: 0.0,
        };
        let result = solve(&data);
        assert_eq!(LpStatus::Optimal, result.status);
        assert!((result.obj_val + 3.0).abs() < 1e-6);
    }

    #[test]
    fn iteration_limit_is_respected() {
        let data = LpData {
            obj: vec![-1.0, -2.0],
            col_lb: vec![0.0, 0.0],
            col_ub: vec![3.0, 3.0],
            rows: vec![vec![(0, 1.0), (1, 1.0)]],
            row_lhs: vec![-f64::INFINITY],
            row_rhs: vec![4.0],
            obj_offset: 0.0,
        };
        let result = SimplexBackend.solve(&data, &Tolerances::default(), Some(0));
        assert_eq!(LpStatus::IterLimit, result.status);
    }
}
