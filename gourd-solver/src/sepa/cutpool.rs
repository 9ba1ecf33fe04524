//! The global cut pool.
//!
//! Cuts that were useful once are parked here and re-separated cheaply against later LP
//! solutions. Pool entries age whenever a separation round passes without them being
//! violated; overaged entries are evicted.

use crate::lp::ColId;
use crate::lp::Row;
use crate::num::Tolerances;

#[derive(Clone, Debug)]
struct PooledCut {
    row: Row,
    age: f64,
}

#[derive(Clone, Debug)]
pub struct CutPool {
    cuts: Vec<PooledCut>,
    /// Rounds a cut may stay unviolated before eviction.
    pub agelimit: f64,
    pub n_added: u64,
    pub n_separated: u64,
}

impl CutPool {
    pub fn new(agelimit: f64) -> CutPool {
        CutPool {
            cuts: Vec::new(),
            agelimit,
            n_added: 0,
            n_separated: 0,
        }
    }

    pub fn n_cuts(&self) -> usize {
        self.cuts.len()
    }

    /// Adds a cut unless an identical one is already pooled.
    pub fn add_cut(&mut self, row: Row) {
        let duplicate = self.cuts.iter().any(|cut| {
            cut.row.lhs == row.lhs && cut.row.rhs == row.rhs && cut.row.terms == row.terms
        });
        if duplicate {
            return;
        }
        self.cuts.push(PooledCut { row, age: 0.0 });
        self.n_added += 1;
    }

    /// Separates the pool against the given solution: violated cuts are returned (and their
    /// age reset), the rest age by one, and overaged cuts are evicted.
    pub fn separate(&mut self, col_value: &dyn Fn(ColId) -> f64, tol: &Tolerances) -> Vec<Row> {
        self.n_separated += 1;
        let mut violated = Vec::new();
        for cut in &mut self.cuts {
            if tol.is_feas_lt(cut.row.feasibility(col_value, tol), 0.0) {
                cut.age = 0.0;
                violated.push(cut.row.clone());
            } else {
                cut.age += 1.0;
            }
        }
        let agelimit = self.agelimit;
        self.cuts.retain(|cut| cut.age <= agelimit);
        violated
    }

    pub fn clear(&mut self) {
        self.cuts.clear();
    }
}
