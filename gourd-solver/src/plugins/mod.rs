//! Plugin kinds and their registries.
//!
//! All solver behaviour beyond the bare driver loop is contributed by plugins: constraint
//! handlers, propagators, separators, heuristics, branching rules, node selectors, conflict
//! and event handlers, presolvers, pricers, relaxators, readers, and display columns. Each
//! kind lives behind a trait; the driver dispatches over priority-ordered registries.

pub mod builtin;
mod branchrule;
mod conshdlr;
mod ctx;
mod display;
mod eventhdlr;
mod heur;
mod nodesel;
mod presol;
mod pricer;
mod propagator;
mod reader;
mod registry;
mod relax;
mod sepa;

pub use branchrule::BranchResult;
pub use branchrule::BranchRule;
pub use conshdlr::CheckResult;
pub use conshdlr::ConsHdlr;
pub use conshdlr::EnforceResult;
pub use ctx::PluginCtx;
pub use display::DisplayColumn;
pub use display::DisplayView;
pub use eventhdlr::EventHdlr;
pub use heur::HeurResult;
pub use heur::HeurTiming;
pub use heur::Heuristic;
pub use nodesel::NodeSel;
pub use presol::PresolResult;
pub use presol::Presolver;
pub use pricer::Pricer;
pub use pricer::PricerResult;
pub use propagator::PropResult;
pub use propagator::Propagator;
pub use reader::Reader;
pub use registry::Named;
pub use registry::Registry;
pub use relax::RelaxResult;
pub use relax::Relaxator;
pub use sepa::Separator;
pub use sepa::SepaResult;

use crate::conflict::ConflictSet;
use crate::model::Cons;
use crate::results::GourdResult;

/// Turns conflict sets produced by conflict analysis into constraints.
pub trait ConflictHdlr: Named {
    /// Returns a constraint encoding the negation of the conflict set, or `None` when the
    /// handler cannot express it.
    fn exec(&mut self, ctx: &mut PluginCtx<'_>, conflict: &ConflictSet)
        -> GourdResult<Option<Cons>>;
}
