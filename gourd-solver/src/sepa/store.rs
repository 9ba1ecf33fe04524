//! The per-round separation storage.
//!
//! Separators and constraint handlers deposit candidate cuts here during one separation
//! round; at the end of the round the storage hands the most efficacious subset to the LP
//! and forgets the rest.

use crate::lp::ColId;
use crate::lp::EfficacyNorm;
use crate::lp::Row;
use crate::num::Tolerances;

/// A candidate cut together with its efficacy against the solution being separated.
#[derive(Clone, Debug)]
struct StoredCut {
    row: Row,
    efficacy: f64,
    /// Forced cuts bypass the efficacy ranking (e.g. enforcement results).
    forced: bool,
}

#[derive(Clone, Debug)]
pub struct SepaStorage {
    cuts: Vec<StoredCut>,
    /// Minimum efficacy for a cut to be admitted at all.
    pub minefficacy: f64,
    pub norm: EfficacyNorm,
}

impl Default for SepaStorage {
    fn default() -> Self {
        SepaStorage {
            cuts: Vec::new(),
            minefficacy: 0.05,
            norm: EfficacyNorm::Euclidean,
        }
    }
}

impl SepaStorage {
    /// Offers a cut to the storage. Returns whether it was admitted.
    pub fn add_cut(
        &mut self,
        row: Row,
        col_value: &dyn Fn(ColId) -> f64,
        tol: &Tolerances,
        forced: bool,
    ) -> bool {
        let efficacy = row.efficacy(col_value, tol, self.norm);
        if !forced && efficacy < self.minefficacy {
            return false;
        }
        self.cuts.push(StoredCut {
            row,
            efficacy,
            forced,
        });
        true
    }

    pub fn n_cuts(&self) -> usize {
        self.cuts.len()
    }

    /// Drains the storage, returning forced cuts plus the `max_cuts` best others by efficacy.
    pub fn take_best(&mut self, max_cuts: usize) -> Vec<Row> {
        let mut cuts = std::mem::take(&mut self.cuts);
        cuts.sort_by(|a, b| {
            b.forced
                .cmp(&a.forced)
                .then(b.efficacy.total_cmp(&a.efficacy))
        });
        let n_forced = cuts.iter().filter(|cut| cut.forced).count();
        cuts.truncate(n_forced.max(max_cuts));
        cuts.into_iter().map(|cut| cut.row).collect()
    }

    /// Discards all candidate cuts, e.g. when the round is abandoned after a domain change.
    pub fn clear_cuts(&mut self) {
        self.cuts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::StorageKey;
    use crate::model::VarId;

    fn cut(name: &str, coef: f64, lhs: f64) -> Row {
        Row {
            name: name.into(),
            lhs,
            rhs: f64::INFINITY,
            terms: vec![(ColId::create_from_index(0), coef)],
            constant: 0.0,
            local: false,
            removable: true,
            modifiable: false,
            age: 0.0,
            rank: 1,
        }
    }

    #[test]
    fn weak_cuts_are_rejected() {
        let mut storage = SepaStorage::default();
        let tol = Tolerances::default();
        let _ = VarId::create_from_index(0);

        // At x = 0 the row x >= 0.01 is violated by 0.01: efficacy 0.01 < 0.05.
        assert!(!storage.add_cut(cut("weak", 1.0, 0.01), &|_| 0.0, &tol, false));
        // Forced cuts are admitted regardless.
        assert!(storage.add_cut(cut("forced", 1.0, 0.01), &|_| 0.0, &tol, true));
        assert_eq!(1, storage.n_cuts());
    }

    #[test]
    fn take_best_ranks_by_efficacy_and_keeps_forced() {
        let mut storage = SepaStorage::default();
        let tol = Tolerances::default();

        assert!(storage.add_cut(cut("mid", 1.0, 2.0), &|_| 0.0, &tol, false));
        assert!(storage.add_cut(cut("strong", 1.0, 5.0), &|_| 0.0, &tol, false));
        assert!(storage.add_cut(cut("forced", 1.0, 0.01), &|_| 0.0, &tol, true));

        let best = storage.take_best(1);
        assert_eq!(2, best.len());
        assert_eq!("forced", best[0].name);
        assert_eq!("strong", best[1].name);
        assert_eq!(0, storage.n_cuts());
    }

    #[test]
    fn clear_discards_everything() {
        let mut storage = SepaStorage::default();
        let tol = Tolerances::default();
        assert!(storage.add_cut(cut("a", 1.0, 3.0), &|_| 0.0, &tol, false));
        storage.clear_cuts();
        assert_eq!(0, storage.n_cuts());
    }
}
