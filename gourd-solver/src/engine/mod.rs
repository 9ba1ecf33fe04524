//! The solver driver: the staged lifecycle machine and the branch-and-bound loop.

mod conflict;
mod copy;
mod limits;
mod probing;
mod search;
mod solver;
pub mod stage;

pub use solver::Solver;
