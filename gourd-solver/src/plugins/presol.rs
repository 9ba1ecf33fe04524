//! The presolver interface.

use super::ctx::PluginCtx;
use super::registry::Named;
use crate::results::GourdResult;

/// Outcome of a presolving round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresolResult {
    DidNotRun,
    DidNotFind,
    /// Reductions were found (fixings, aggregations, bound changes, deletions).
    Reduced,
    /// The problem was proven infeasible.
    Cutoff,
    /// The problem was proven unbounded.
    Unbounded,
}

pub trait Presolver: Named {
    /// Maximal number of rounds the presolver participates in (-1 for no limit).
    fn maxrounds(&self) -> i32 {
        -1
    }

    /// Runs one presolving round on the transformed problem.
    fn exec(&mut self, ctx: &mut PluginCtx<'_>, round: u32) -> GourdResult<PresolResult>;
}
