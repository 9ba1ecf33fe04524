//! # Gourd
//! Gourd is a solver for constraint integer programs (CIP): mixed-integer
//! programs whose linear relaxation is coupled with arbitrary user-pluggable
//! constraint handlers. The library provides the solver driver — the staged
//! lifecycle state machine orchestrating problem loading, transformation,
//! presolving, branch-and-bound search with LP relaxations, primal
//! heuristics, cut separation, and conflict analysis — together with the
//! plugin registries every extension point hangs off.
//!
//! The concrete mathematics lives in plugins: constraint handlers,
//! propagators, presolvers, separators, heuristics, branching rules, node
//! selectors, conflict handlers, readers, and more. A small built-in suite
//! (linear constraints, a locks-based rounding heuristic, most-fractional
//! branching, best-bound and depth-first node selection) makes the solver
//! usable out of the box.
//!
//! # Using gourd
//! The first step is creating a [`Solver`] and building a problem:
//! ```rust
//! # use gourd_solver::Solver;
//! # use gourd_solver::model::VarType;
//! # fn main() -> Result<(), gourd_solver::results::Error> {
//! let mut solver = Solver::default();
//! solver.create_prob("example")?;
//!
//! // minimise x + y subject to x + y >= 3, x, y >= 0
//! let x = solver.create_var("x", 0.0, f64::INFINITY, 1.0, VarType::Continuous)?;
//! let y = solver.create_var("y", 0.0, f64::INFINITY, 1.0, VarType::Continuous)?;
//! solver.add_linear_cons("c", &[(x, 1.0), (y, 1.0)], 3.0, f64::INFINITY)?;
//! # Ok(())
//! # }
//! ```
//!
//! Then the problem is solved through the staged lifecycle; the solve status
//! is a separate axis from the error codes:
//! ```rust
//! # use gourd_solver::Solver;
//! # use gourd_solver::model::VarType;
//! # use gourd_solver::results::SolveStatus;
//! # fn main() -> Result<(), gourd_solver::results::Error> {
//! # let mut solver = Solver::default();
//! # solver.create_prob("example")?;
//! # let x = solver.create_var("x", 0.0, f64::INFINITY, 1.0, VarType::Continuous)?;
//! # let y = solver.create_var("y", 0.0, f64::INFINITY, 1.0, VarType::Continuous)?;
//! # solver.add_linear_cons("c", &[(x, 1.0), (y, 1.0)], 3.0, f64::INFINITY)?;
//! solver.solve()?;
//! assert_eq!(solver.status(), SolveStatus::Optimal);
//! let best = solver.best_sol().expect("a feasible problem has an incumbent");
//! assert!((solver.sol_orig_obj(best) - 3.0).abs() < 1e-6);
//! # Ok(())
//! # }
//! ```

pub(crate) mod asserts;
pub(crate) mod basic_types;

pub mod conflict;
pub mod containers;
pub mod engine;
pub mod events;
pub mod io;
pub mod lp;
pub mod model;
pub mod num;
pub mod params;
pub mod plugins;
pub mod primal;
pub mod results;
pub mod sepa;
pub mod statistics;
pub mod tree;

pub use rand;

pub use crate::engine::stage::Stage;
pub use crate::engine::Solver;
pub use crate::results::SolveStatus;
