//! Separation storage, cut pools, and cut aggregation.

mod cutpool;
mod mir;
mod store;

pub use cutpool::CutPool;
pub use mir::calc_mir;
pub use mir::calc_strong_cg;
pub use mir::AggregatedCut;
pub use store::SepaStorage;
