//! The domain propagator interface (constraint-independent propagation).

use super::ctx::PluginCtx;
use super::registry::Named;
use crate::conflict::ConflictBound;
use crate::model::BoundEvent;
use crate::model::Problem;
use crate::results::GourdResult;

/// Outcome of a propagation round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropResult {
    /// The propagator was not executed.
    DidNotRun,
    /// Executed but found nothing.
    DidNotFind,
    /// At least one local bound was tightened.
    ReducedDom,
    /// The focus node was proven infeasible.
    Cutoff,
}

pub trait Propagator: Named {
    /// Every how many depth levels the propagator runs (-1 disables, 0 root only).
    fn freq(&self) -> i32 {
        1
    }

    fn propagate(&mut self, ctx: &mut PluginCtx<'_>) -> GourdResult<PropResult>;

    /// Reconstructs the premises of a bound change this propagator inferred.
    fn resolve_propagation(
        &self,
        problem: &Problem,
        event: &BoundEvent,
    ) -> GourdResult<Option<Vec<ConflictBound>>> {
        let _ = (problem, event);
        Ok(None)
    }
}
