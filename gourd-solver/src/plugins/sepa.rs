//! The separator interface (constraint-independent cutting planes).

use super::ctx::PluginCtx;
use super::registry::Named;
use crate::results::GourdResult;
use crate::sepa::SepaStorage;

/// Outcome of a separation round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SepaResult {
    DidNotRun,
    DidNotFind,
    /// Cuts were added to the separation storage.
    Separated,
    /// Domains were reduced as a side effect; propagation should rerun.
    ReducedDom,
    /// The focus node was proven infeasible.
    Cutoff,
}

pub trait Separator: Named {
    fn freq(&self) -> i32 {
        1
    }

    /// Minimum efficacy a cut from this separator should have to be worth storing.
    fn maxbounddist(&self) -> f64 {
        1.0
    }

    /// Separates the current LP solution into the storage.
    fn exec_lp(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        storage: &mut SepaStorage,
    ) -> GourdResult<SepaResult>;
}
