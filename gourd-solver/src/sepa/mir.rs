//! Mixed-integer rounding and strong Chvátal-Gomory cut aggregation.
//!
//! Both procedures share the same pipeline: aggregate LP rows with the given weights into a
//! single <= inequality, substitute column bounds so every variable is nonnegative, apply the
//! rounding function, and translate back to column space. Modifiable rows are excluded from
//! the aggregation because their coefficient vectors are not final.

use fnv::FnvHashMap;

use crate::lp::ColId;
use crate::lp::Lp;
use crate::lp::RowId;
use crate::num::Tolerances;

/// A cut `terms' x <= rhs` produced by aggregation, in column space.
#[derive(Clone, Debug)]
pub struct AggregatedCut {
    pub terms: Vec<(ColId, f64)>,
    pub rhs: f64,
    pub rank: i32,
    pub local: bool,
}

/// How a column was made nonnegative during aggregation.
#[derive(Clone, Copy, Debug)]
enum Substitution {
    /// `x = lb + x'`.
    Shift(f64),
    /// `x = ub - x'`.
    Mirror(f64),
}

struct SubstitutedRow {
    /// Coefficient and substitution per column, over nonnegative variables.
    terms: Vec<(ColId, f64, Substitution, bool)>,
    rhs: f64,
    rank: i32,
    local: bool,
}

/// Aggregates the weighted rows into `a'x <= b` and substitutes bounds. Returns `None` when a
/// needed row side or column bound is infinite.
fn aggregate(
    lp: &Lp,
    weights: &[(RowId, f64)],
    tol: &Tolerances,
    local_bounds: bool,
) -> Option<SubstitutedRow> {
    let mut coefs: FnvHashMap<ColId, f64> = FnvHashMap::default();
    let mut rhs = 0.0;
    let mut rank = 0;
    let mut local = local_bounds;
    let mut used_any = false;
    for &(row_id, weight) in weights {
        if weight.abs() < tol.eps {
            continue;
        }
        let row = lp.row(row_id);
        if row.modifiable {
            continue;
        }
        let side = if weight > 0.0 { row.rhs } else { row.lhs };
        if tol.is_infinity(side.abs()) {
            return None;
        }
        for &(col, coef) in &row.terms {
            *coefs.entry(col).or_insert(0.0) += weight * coef;
        }
        rhs += weight * (side - row.constant);
        rank = rank.max(row.rank);
        local |= row.local;
        used_any = true;
    }
    if !used_any {
        return None;
    }

    let mut terms = Vec::with_capacity(coefs.len());
    for (col, coef) in coefs {
        if coef.abs() < tol.eps {
            continue;
        }
        let column = lp.col(col);
        let substitution = if !tol.is_neg_infinity(column.lb) {
            rhs -= coef * column.lb;
            Substitution::Shift(column.lb)
        } else if !tol.is_infinity(column.ub) {
            rhs -= coef * column.ub;
            Substitution::Mirror(column.ub)
        } else {
            return None;
        };
        let coef = match substitution {
            Substitution::Shift(_) => coef,
            Substitution::Mirror(_) => -coef,
        };
        terms.push((col, coef, substitution, column.integral));
    }
    Some(SubstitutedRow {
        terms,
        rhs,
        rank: rank + 1,
        local,
    })
}

/// Translates rounded coefficients over the substituted variables back to column space.
fn unsubstitute(
    terms: Vec<(ColId, f64, Substitution)>,
    mut rhs: f64,
    tol: &Tolerances,
    rank: i32,
    local: bool,
) -> Option<AggregatedCut> {
    let mut cut_terms = Vec::with_capacity(terms.len());
    for (col, coef, substitution) in terms {
        if coef.abs() < tol.eps {
            continue;
        }
        match substitution {
            Substitution::Shift(lb) => {
                rhs += coef * lb;
                cut_terms.push((col, coef));
            }
            Substitution::Mirror(ub) => {
                rhs -= coef * ub;
                cut_terms.push((col, -coef));
            }
        }
    }
    if cut_terms.is_empty() {
        return None;
    }
    Some(AggregatedCut {
        terms: cut_terms,
        rhs,
        rank,
        local,
    })
}

/// Computes a mixed-integer rounding cut from the weighted row aggregation.
///
/// Integer coefficients are MIR-rounded; continuous variables with positive substituted
/// coefficients are relaxed away and negative ones are scaled by `1/(1 - f0)`.
pub fn calc_mir(
    lp: &Lp,
    weights: &[(RowId, f64)],
    tol: &Tolerances,
    local_bounds: bool,
) -> Option<AggregatedCut> {
    let aggregated = aggregate(lp, weights, tol, local_bounds)?;
    let f0 = tol.frac(aggregated.rhs);
    if f0 < tol.sumeps || f0 > 1.0 - tol.sumeps {
        return None;
    }

    let mut rounded = Vec::with_capacity(aggregated.terms.len());
    for (col, coef, substitution, integral) in aggregated.terms {
        let new_coef = if integral {
            let fj = tol.frac(coef);
            coef.floor() + (fj - f0).max(0.0) / (1.0 - f0)
        } else if coef < 0.0 {
            coef / (1.0 - f0)
        } else {
            0.0
        };
        rounded.push((col, new_coef, substitution));
    }
    unsubstitute(
        rounded,
        aggregated.rhs.floor(),
        tol,
        aggregated.rank,
        aggregated.local,
    )
}

/// Computes a strong Chvátal-Gomory cut from the weighted row aggregation.
///
/// Only applicable when every continuous variable ends up with a nonnegative substituted
/// coefficient (those are relaxed away); a negative continuous coefficient aborts.
pub fn calc_strong_cg(
    lp: &Lp,
    weights: &[(RowId, f64)],
    tol: &Tolerances,
    local_bounds: bool,
) -> Option<AggregatedCut> {
    let aggregated = aggregate(lp, weights, tol, local_bounds)?;
    let f0 = tol.frac(aggregated.rhs);
    if f0 < tol.sumeps || f0 > 1.0 - tol.sumeps {
        return None;
    }
    let k = (1.0 / f0).ceil() - 1.0;

    let mut rounded = Vec::with_capacity(aggregated.terms.len());
    for (col, coef, substitution, integral) in aggregated.terms {
        let new_coef = if integral {
            let fj = tol.frac(coef);
            if fj <= f0 + tol.eps || k < 1.0 {
                coef.floor()
            } else {
                let p = (k * (fj - f0) / (1.0 - f0)).ceil();
                coef.floor() + p / (k + 1.0)
            }
        } else if coef < -tol.eps {
            return None;
        } else {
            0.0
        };
        rounded.push((col, new_coef, substitution));
    }
    unsubstitute(
        rounded,
        aggregated.rhs.floor(),
        tol,
        aggregated.rank,
        aggregated.local,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::StorageKey;
    use crate::lp::Col;
    use crate::lp::Row;
    use crate::model::VarId;

    fn lp_with(cols: Vec<(f64, f64, bool)>, rows: Vec<(Vec<(usize, f64)>, f64, f64, bool)>) -> Lp {
        let mut lp = Lp::default();
        let mut ids = Vec::new();
        for (i, (lb, ub, integral)) in cols.into_iter().enumerate() {
            ids.push(lp.add_col(Col {
                var: VarId::create_from_index(i),
                obj: 0.0,
                lb,
                ub,
                integral,
            }));
        }
        for (i, (terms, lhs, rhs, modifiable)) in rows.into_iter().enumerate() {
            let _ = lp.add_row(Row {
                name: format!("r{i}"),
                lhs,
                rhs,
                terms: terms.into_iter().map(|(j, c)| (ids[j], c)).collect(),
                constant: 0.0,
                local: false,
                removable: false,
                modifiable,
                age: 0.0,
                rank: 0,
            });
        }
        lp.mark_constructed();
        lp
    }

    fn coef_of(cut: &AggregatedCut, col: usize) -> f64 {
        cut.terms
            .iter()
            .find(|&&(c, _)| c == ColId::create_from_index(col))
            .map(|&(_, coef)| coef)
            .unwrap_or(0.0)
    }

    #[test]
    fn mir_rounds_a_fractional_integer_row() {
        // x <= 2.5 with x integer in [0, 10] rounds to x <= 2.
        let lp = lp_with(
            vec![(0.0, 10.0, true)],
            vec![(vec![(0, 1.0)], -f64::INFINITY, 2.5, false)],
        );
        let tol = Tolerances::default();
        let row = lp.rows().next().unwrap().0;

        let cut = calc_mir(&lp, &[(row, 1.0)], &tol, false).unwrap();
        assert_eq!(1, cut.rank);
        assert!((coef_of(&cut, 0) - 1.0).abs() < 1e-9);
        assert!((cut.rhs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn mir_scales_negative_continuous_coefficients() {
        // x - y <= 2.5, x integer, y continuous >= 0: MIR gives x - 2y <= 2.
        let lp = lp_with(
            vec![(0.0, 10.0, true), (0.0, f64::INFINITY, false)],
            vec![(vec![(0, 1.0), (1, -1.0)], -f64::INFINITY, 2.5, false)],
        );
        let tol = Tolerances::default();
        let row = lp.rows().next().unwrap().0;

        let cut = calc_mir(&lp, &[(row, 1.0)], &tol, false).unwrap();
        assert!((coef_of(&cut, 0) - 1.0).abs() < 1e-9);
        assert!((coef_of(&cut, 1) + 2.0).abs() < 1e-9);
        assert!((cut.rhs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn integral_aggregation_yields_no_cut() {
        let lp = lp_with(
            vec![(0.0, 10.0, true)],
            vec![(vec![(0, 1.0)], -f64::INFINITY, 3.0, false)],
        );
        let tol = Tolerances::default();
        let row = lp.rows().next().unwrap().0;
        assert!(calc_mir(&lp, &[(row, 1.0)], &tol, false).is_none());
    }

    #[test]
    fn modifiable_rows_are_excluded_from_aggregation() {
        let lp = lp_with(
            vec![(0.0, 10.0, true)],
            vec![
                (vec![(0, 1.0)], -f64::INFINITY, 2.5, false),
                (vec![(0, 5.0)], -f64::INFINITY, 7.5, true),
            ],
        );
        let tol = Tolerances::default();
        let rows: Vec<RowId> = lp.rows().map(|(id, _)| id).collect();

        // The modifiable row contributes nothing, so the result equals the single-row cut.
        let cut = calc_mir(&lp, &[(rows[0], 1.0), (rows[1], 1.0)], &tol, false).unwrap();
        assert!((coef_of(&cut, 0) - 1.0).abs() < 1e-9);
        assert!((cut.rhs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn strong_cg_rounds_with_the_subadditive_function() {
        // 1.6 x1 + 2 x2 <= 3.5, both integer: f0 = 0.5, k = 1, giving 1.5 x1 + 2 x2 <= 3.
        let lp = lp_with(
            vec![(0.0, 10.0, true), (0.0, 10.0, true)],
            vec![(vec![(0, 1.6), (1, 2.0)], -f64::INFINITY, 3.5, false)],
        );
        let tol = Tolerances::default();
        let row = lp.rows().next().unwrap().0;

        let cut = calc_strong_cg(&lp, &[(row, 1.0)], &tol, false).unwrap();
        assert!((coef_of(&cut, 0) - 1.5).abs() < 1e-9);
        assert!((coef_of(&cut, 1) - 2.0).abs() < 1e-9);
        assert!((cut.rhs - 3.0).abs() < 1e-9);
    }

    #[test]
    fn strong_cg_refuses_negative_continuous_coefficients() {
        let lp = lp_with(
            vec![(0.0, 10.0, true), (0.0, f64::INFINITY, false)],
            vec![(vec![(0, 1.0), (1, -1.0)], -f64::INFINITY, 2.5, false)],
        );
        let tol = Tolerances::default();
        let row = lp.rows().next().unwrap().0;
        assert!(calc_strong_cg(&lp, &[(row, 1.0)], &tol, false).is_none());
    }

    #[test]
    fn negative_weights_use_the_left_hand_side() {
        // Row 3 <= x: with weight -1 it aggregates to -x <= -3; shifted bounds keep it exact.
        let lp = lp_with(
            vec![(0.0, 10.0, true)],
            vec![(vec![(0, 1.0)], 2.5, f64::INFINITY, false)],
        );
        let tol = Tolerances::default();
        let row = lp.rows().next().unwrap().0;

        let cut = calc_mir(&lp, &[(row, -1.0)], &tol, false).unwrap();
        // -x <= -2.5 over integers rounds to -x <= -3, i.e. x >= 3.
        assert!((coef_of(&cut, 0) + 1.0).abs() < 1e-9);
        assert!((cut.rhs + 3.0).abs() < 1e-9);
    }
}
