//! The primal solution pool.
//!
//! Feasible solutions are kept sorted by objective value (internal minimisation sense). The
//! pool is bounded; adding a solution beyond the capacity evicts the worst one. The best
//! entry is the incumbent and drives the cutoff bound of the tree.

mod solution;

pub use solution::SolOrigin;
pub use solution::Solution;

use fnv::FnvHashMap;

use crate::model::VarId;
use crate::num::Tolerances;

/// The pool of feasible solutions plus the primal ray, if one was found.
#[derive(Clone, Debug)]
pub struct Primal {
    sols: Vec<Solution>,
    /// Capacity of the pool.
    pub maxsols: usize,
    pub n_found: u64,
    pub n_improvements: u64,
    ray: Option<FnvHashMap<VarId, f64>>,
}

impl Default for Primal {
    fn default() -> Self {
        Primal {
            sols: Vec::new(),
            maxsols: 100,
            n_found: 0,
            n_improvements: 0,
            ray: None,
        }
    }
}

impl Primal {
    pub fn n_sols(&self) -> usize {
        self.sols.len()
    }

    pub fn sols(&self) -> &[Solution] {
        &self.sols
    }

    /// The incumbent: the best solution found so far.
    pub fn best_sol(&self) -> Option<&Solution> {
        self.sols.first()
    }

    /// Objective value of the incumbent, or infinity without one.
    pub fn upper_bound(&self) -> f64 {
        self.best_sol().map(|sol| sol.obj).unwrap_or(f64::INFINITY)
    }

    /// Inserts a solution with its `obj` field already computed. Returns whether it became
    /// the new incumbent.
    pub fn add_sol(&mut self, sol: Solution, tol: &Tolerances) -> bool {
        self.n_found += 1;
        let improvement = tol.is_lt(sol.obj, self.upper_bound());
        if improvement {
            self.n_improvements += 1;
        }
        let pos = self
            .sols
            .partition_point(|existing| existing.obj <= sol.obj);
        if pos >= self.maxsols {
            return false;
        }
        self.sols.insert(pos, sol);
        self.sols.truncate(self.maxsols);
        improvement
    }

    pub fn clear(&mut self) {
        self.sols.clear();
        self.ray = None;
    }

    /// Retains only the incumbent, e.g. across a restart.
    pub fn keep_best_only(&mut self) {
        self.sols.truncate(1);
    }

    // --- primal ray ---------------------------------------------------------------------

    pub fn set_ray(&mut self, ray: FnvHashMap<VarId, f64>) {
        self.ray = Some(ray);
    }

    pub fn has_ray(&self) -> bool {
        self.ray.is_some()
    }

    pub fn ray_val(&self, var: VarId) -> f64 {
        self.ray
            .as_ref()
            .and_then(|ray| ray.get(&var).copied())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sol(obj: f64) -> Solution {
        let mut sol = Solution::new(SolOrigin::User, true);
        sol.obj = obj;
        sol
    }

    #[test]
    fn pool_stays_sorted_ascending() {
        let mut primal = Primal::default();
        let tol = Tolerances::default();

        assert!(primal.add_sol(sol(10.0), &tol));
        assert!(primal.add_sol(sol(7.0), &tol));
        assert!(!primal.add_sol(sol(8.0), &tol));

        let objs: Vec<f64> = primal.sols().iter().map(|s| s.obj).collect();
        assert_eq!(vec![7.0, 8.0, 10.0], objs);
        assert_eq!(7.0, primal.upper_bound());
        assert_eq!(2, primal.n_improvements);
    }

    #[test]
    fn capacity_evicts_the_worst() {
        let mut primal = Primal {
            maxsols: 2,
            ..Primal::default()
        };
        let tol = Tolerances::default();

        let _ = primal.add_sol(sol(5.0), &tol);
        let _ = primal.add_sol(sol(3.0), &tol);
        let _ = primal.add_sol(sol(4.0), &tol);
        let objs: Vec<f64> = primal.sols().iter().map(|s| s.obj).collect();
        assert_eq!(vec![3.0, 4.0], objs);

        // A solution worse than everything in a full pool is dropped outright.
        let _ = primal.add_sol(sol(9.0), &tol);
        assert_eq!(2, primal.n_sols());
    }

    #[test]
    fn ray_values_default_to_zero() {
        use crate::containers::StorageKey;
        let mut primal = Primal::default();
        assert!(!primal.has_ray());

        let x = VarId::create_from_index(0);
        let mut ray = FnvHashMap::default();
        let _ = ray.insert(x, -1.0);
        primal.set_ray(ray);
        assert!(primal.has_ray());
        assert_eq!(-1.0, primal.ray_val(x));
        assert_eq!(0.0, primal.ray_val(VarId::create_from_index(1)));
    }
}
