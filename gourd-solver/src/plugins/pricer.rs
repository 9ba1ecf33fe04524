//! The variable pricer interface.

use super::ctx::PluginCtx;
use super::registry::Named;
use crate::results::GourdResult;

/// Outcome of a pricing round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricerResult {
    /// Number of variables added to the problem and LP.
    pub n_priced: usize,
    /// A valid lower bound on the LP value even before the added columns are priced in.
    pub lowerbound: Option<f64>,
    /// Early stop: the pricer knows no further improving columns exist.
    pub stop_early: bool,
}

/// Prices new problem variables against the current LP duals.
///
/// Pricers are only active when explicitly activated for the problem; a problem solved with
/// an active pricer has a dynamic variable set, which disables reduced-cost fixings and
/// dual presolving elsewhere.
pub trait Pricer: Named {
    /// Called when the LP was solved to optimality; may add improving columns.
    fn redcost(&mut self, ctx: &mut PluginCtx<'_>) -> GourdResult<PricerResult>;

    /// Called on infeasible LPs to add columns restoring feasibility (Farkas pricing).
    fn farkas(&mut self, ctx: &mut PluginCtx<'_>) -> GourdResult<PricerResult> {
        let _ = ctx;
        Ok(PricerResult {
            n_priced: 0,
            lowerbound: None,
            stop_early: false,
        })
    }
}
